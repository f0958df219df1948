//! Numeric coercion of the fields the request carries as strings.

use crate::models::record::{Cell, Record};
use crate::models::request::field;

/// Fields parsed into numbers before cleaning.
pub const NUMERIC_FIELDS: [&str; 3] = [
    field::DELIVERY_PERSON_AGE,
    field::DELIVERY_PERSON_RATINGS,
    field::MULTIPLE_DELIVERIES,
];

/// Parses a single cell. Text that is not a finite number becomes
/// `Missing`; numbers and `Missing` pass through unchanged.
pub fn coerce_cell(cell: Cell) -> Cell {
    match cell {
        Cell::Text(text) => match text.trim().parse::<f64>() {
            Ok(n) => Cell::number(n),
            Err(_) => Cell::Missing,
        },
        Cell::Number(n) => Cell::number(n),
        Cell::Missing => Cell::Missing,
    }
}

/// Replaces the numeric fields of `record` with their parsed values. Absent
/// columns are left absent for the cleaner to report.
pub fn coerce_numeric(mut record: Record) -> Record {
    for name in NUMERIC_FIELDS {
        if let Some(cell) = record.remove(name) {
            record.insert(name, coerce_cell(cell));
        }
    }
    record
}
