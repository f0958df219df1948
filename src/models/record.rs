use serde::Serialize;
use std::collections::BTreeMap;

/// One value in a [`Record`]. `Missing` is the sentinel that numeric coercion
/// and cleaning substitute for values they cannot use.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Wraps a number, mapping non-finite values to `Missing`.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Missing
        }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map(Cell::number).unwrap_or(Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

/// Single-row table passed between pipeline stages.
///
/// An absent column and a column holding [`Cell::Missing`] are different
/// things: the first is a contract break between stages, the second is an
/// ordinary gap the fitted imputation fills in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    columns: BTreeMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, cell: Cell) -> Self {
        self.insert(name, cell);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, cell: Cell) -> Option<Cell> {
        self.columns.insert(name.into(), cell)
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.columns.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Cell> {
        self.columns.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_number_becomes_missing() {
        assert_eq!(Cell::number(f64::NAN), Cell::Missing);
        assert_eq!(Cell::number(f64::INFINITY), Cell::Missing);
        assert_eq!(Cell::number(2.5), Cell::Number(2.5));
    }

    #[test]
    fn test_absent_and_missing_are_distinct() {
        let record = Record::new().with("age", Cell::Missing);

        assert!(record.contains("age"));
        assert!(record.get("age").unwrap().is_missing());
        assert!(!record.contains("ratings"));
    }
}
