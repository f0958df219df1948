//! Record cleaning: repairs raw request values and derives the features the
//! model was trained on.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};

use crate::error::CleaningError;
use crate::models::record::{Cell, Record};
use crate::models::request::field;

/// Column names of a cleaned record.
pub mod column {
    pub const AGE: &str = "age";
    pub const RATINGS: &str = "ratings";
    pub const WEATHER: &str = "weather";
    pub const TRAFFIC: &str = "traffic";
    pub const VEHICLE_CONDITION: &str = "vehicle_condition";
    pub const TYPE_OF_ORDER: &str = "type_of_order";
    pub const TYPE_OF_VEHICLE: &str = "type_of_vehicle";
    pub const MULTIPLE_DELIVERIES: &str = "multiple_deliveries";
    pub const FESTIVAL: &str = "festival";
    pub const CITY_TYPE: &str = "city_type";
    pub const IS_WEEKEND: &str = "is_weekend";
    pub const PICKUP_TIME_MINUTES: &str = "pickup_time_minutes";
    pub const ORDER_TIME_OF_DAY: &str = "order_time_of_day";
    pub const DISTANCE: &str = "distance";
    pub const DISTANCE_TYPE: &str = "distance_type";

    pub const ALL: [&str; 15] = [
        AGE,
        RATINGS,
        WEATHER,
        TRAFFIC,
        VEHICLE_CONDITION,
        TYPE_OF_ORDER,
        TYPE_OF_VEHICLE,
        MULTIPLE_DELIVERIES,
        FESTIVAL,
        CITY_TYPE,
        IS_WEEKEND,
        PICKUP_TIME_MINUTES,
        ORDER_TIME_OF_DAY,
        DISTANCE,
        DISTANCE_TYPE,
    ];
}

const EARTH_RADIUS_KM: f64 = 6371.0;
const SECONDS_PER_DAY: i64 = 86_400;

/// Table-in, table-out cleaning step.
///
/// Implementations must be deterministic and idempotent, and must not fail
/// on well-formed records, including ones whose numeric fields hold
/// [`Cell::Missing`].
pub trait Cleaner: Send + Sync {
    fn clean(&self, record: &Record) -> Result<Record, CleaningError>;
}

/// Cleaner reproducing the repairs applied to the training data.
#[derive(Debug, Clone)]
pub struct DeliveryCleaner {
    pub min_age: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    /// Absolute coordinates below this are treated as unknown locations.
    pub min_coordinate: f64,
}

impl Default for DeliveryCleaner {
    fn default() -> Self {
        Self {
            min_age: 18.0,
            min_rating: 1.0,
            max_rating: 5.0,
            min_coordinate: 1.0,
        }
    }
}

impl Cleaner for DeliveryCleaner {
    fn clean(&self, record: &Record) -> Result<Record, CleaningError> {
        if is_cleaned(record) {
            return Ok(self.reclean(record));
        }

        let age = self.age(input(record, field::DELIVERY_PERSON_AGE)?);
        let ratings = self.rating(input(record, field::DELIVERY_PERSON_RATINGS)?);
        let multiple_deliveries = delivery_count(input(record, field::MULTIPLE_DELIVERIES)?);
        let vehicle_condition = number(input(record, field::VEHICLE_CONDITION)?);

        let restaurant = (
            self.coordinate(input(record, field::RESTAURANT_LATITUDE)?),
            self.coordinate(input(record, field::RESTAURANT_LONGITUDE)?),
        );
        let delivery = (
            self.coordinate(input(record, field::DELIVERY_LOCATION_LATITUDE)?),
            self.coordinate(input(record, field::DELIVERY_LOCATION_LONGITUDE)?),
        );
        let distance = match (restaurant, delivery) {
            ((Some(lat1), Some(lon1)), (Some(lat2), Some(lon2))) => {
                Some(haversine_km(lat1, lon1, lat2, lon2))
            }
            _ => None,
        };

        let order_date = parse_date(field::ORDER_DATE, input(record, field::ORDER_DATE)?)?;
        let is_weekend = matches!(order_date.weekday(), Weekday::Sat | Weekday::Sun);

        let ordered = match text(input(record, field::TIME_ORDERD)?) {
            Some(raw) => Some(parse_time(field::TIME_ORDERD, raw)?),
            None => None,
        };
        let picked_cell = input(record, field::TIME_ORDER_PICKED)?;
        let picked = match text(picked_cell) {
            Some(raw) => parse_time(field::TIME_ORDER_PICKED, raw)?,
            None => {
                return Err(invalid(
                    field::TIME_ORDER_PICKED,
                    picked_cell,
                    "pickup time is required",
                ))
            }
        };
        let pickup_time_minutes = ordered.map(|ordered| pickup_minutes(ordered, picked));
        let order_time_of_day = ordered.and_then(|t| time_of_day(t.hour()));

        let weather = text(input(record, field::WEATHERCONDITIONS)?).map(|raw| {
            let raw = raw.trim();
            raw.strip_prefix("conditions ").unwrap_or(raw).trim().to_lowercase()
        });

        Ok(Record::new()
            .with(column::AGE, Cell::from_option(age))
            .with(column::RATINGS, Cell::from_option(ratings))
            .with(column::WEATHER, label(weather.filter(|w| !is_nan_text(w))))
            .with(column::TRAFFIC, category(input(record, field::ROAD_TRAFFIC_DENSITY)?))
            .with(column::VEHICLE_CONDITION, Cell::from_option(vehicle_condition))
            .with(column::TYPE_OF_ORDER, category(input(record, field::TYPE_OF_ORDER)?))
            .with(column::TYPE_OF_VEHICLE, category(input(record, field::TYPE_OF_VEHICLE)?))
            .with(column::MULTIPLE_DELIVERIES, Cell::from_option(multiple_deliveries))
            .with(column::FESTIVAL, category(input(record, field::FESTIVAL)?))
            .with(column::CITY_TYPE, category(input(record, field::CITY)?))
            .with(column::IS_WEEKEND, Cell::Number(if is_weekend { 1.0 } else { 0.0 }))
            .with(column::PICKUP_TIME_MINUTES, Cell::from_option(pickup_time_minutes))
            .with(column::ORDER_TIME_OF_DAY, label(order_time_of_day.map(str::to_string)))
            .with(column::DISTANCE, Cell::from_option(distance))
            .with(
                column::DISTANCE_TYPE,
                label(distance.and_then(distance_type).map(str::to_string)),
            ))
    }
}

impl DeliveryCleaner {
    fn age(&self, cell: &Cell) -> Option<f64> {
        number(cell).filter(|age| *age >= self.min_age)
    }

    fn rating(&self, cell: &Cell) -> Option<f64> {
        number(cell).filter(|rating| (self.min_rating..=self.max_rating).contains(rating))
    }

    /// Re-applies the range repairs to a record already in cleaned form.
    /// Derived columns are kept as they are.
    fn reclean(&self, record: &Record) -> Record {
        let mut cleaned = Record::new();
        for name in column::ALL {
            let cell = record.get(name).cloned().unwrap_or(Cell::Missing);
            let cell = match name {
                column::AGE => Cell::from_option(self.age(&cell)),
                column::RATINGS => Cell::from_option(self.rating(&cell)),
                column::MULTIPLE_DELIVERIES => Cell::from_option(delivery_count(&cell)),
                _ => cell,
            };
            cleaned.insert(name, cell);
        }
        cleaned
    }

    fn coordinate(&self, cell: &Cell) -> Option<f64> {
        number(cell)
            .map(f64::abs)
            .filter(|value| *value >= self.min_coordinate)
    }
}

fn is_cleaned(record: &Record) -> bool {
    column::ALL.iter().all(|name| record.contains(name))
}

/// Non-negative whole number of concurrent deliveries.
fn delivery_count(cell: &Cell) -> Option<f64> {
    number(cell).filter(|count| *count >= 0.0 && count.fract() == 0.0)
}

fn input<'a>(record: &'a Record, name: &str) -> Result<&'a Cell, CleaningError> {
    record
        .get(name)
        .ok_or_else(|| CleaningError::MissingColumn(name.to_string()))
}

fn is_nan_text(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
}

/// Text content of a cell, treating blank and `NaN` text as absent.
fn text(cell: &Cell) -> Option<&str> {
    cell.as_text().filter(|s| !is_nan_text(s))
}

fn number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn category(cell: &Cell) -> Cell {
    label(text(cell).map(|s| s.trim().to_lowercase()))
}

fn label(value: Option<String>) -> Cell {
    value.map(Cell::Text).unwrap_or(Cell::Missing)
}

fn invalid(column: &str, cell: &Cell, reason: &str) -> CleaningError {
    let value = match cell {
        Cell::Text(s) => s.clone(),
        Cell::Number(n) => n.to_string(),
        Cell::Missing => String::new(),
    };
    CleaningError::InvalidValue {
        column: column.to_string(),
        value,
        reason: reason.to_string(),
    }
}

fn parse_date(column: &str, cell: &Cell) -> Result<NaiveDate, CleaningError> {
    const FORMATS: [&str; 3] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"];

    let raw = text(cell).ok_or_else(|| invalid(column, cell, "date is required"))?;
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| invalid(column, cell, "expected a dd-mm-yyyy date"))
}

fn parse_time(column: &str, raw: &str) -> Result<NaiveTime, CleaningError> {
    const FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| CleaningError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
            reason: "expected an HH:MM[:SS] time".to_string(),
        })
}

/// Minutes between order and pickup, wrapping past midnight.
fn pickup_minutes(ordered: NaiveTime, picked: NaiveTime) -> f64 {
    let seconds = (picked - ordered).num_seconds().rem_euclid(SECONDS_PER_DAY);
    seconds as f64 / 60.0
}

/// Right-closed hour bins: (0,6], (6,12], (12,17], (17,20], (20,24].
fn time_of_day(hour: u32) -> Option<&'static str> {
    match hour {
        1..=6 => Some("after_midnight"),
        7..=12 => Some("morning"),
        13..=17 => Some("afternoon"),
        18..=20 => Some("evening"),
        21..=24 => Some("night"),
        _ => None,
    }
}

/// Left-closed distance bins in km: [0,5), [5,10), [10,15), [15,25).
fn distance_type(distance: f64) -> Option<&'static str> {
    match distance {
        d if (0.0..5.0).contains(&d) => Some("short"),
        d if (5.0..10.0).contains(&d) => Some("medium"),
        d if (10.0..15.0).contains(&d) => Some("long"),
        d if (15.0..25.0).contains(&d) => Some("very_long"),
        _ => None,
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}
