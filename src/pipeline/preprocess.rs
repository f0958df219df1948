//! Fitted column transformer turning a cleaned record into a fixed-width
//! feature vector.

use serde::{Deserialize, Serialize};

use crate::error::SchemaMismatchError;
use crate::models::record::{Cell, Record};

/// Persisted preprocessing transformer. Steps run in order and each appends
/// its outputs to the feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default = "default_version")]
    pub version: u32,
    pub steps: Vec<Step>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// `(x - data_min) / (data_max - data_min)`, missing values imputed with
    /// `fill` first.
    MinMax {
        columns: Vec<String>,
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        fill: Vec<f64>,
    },
    /// Unknown and missing categories encode as all zeros.
    OneHot {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        #[serde(default)]
        drop_first: bool,
    },
    /// Category index; unknown and missing values take `fill`.
    Ordinal {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        fill: Vec<f64>,
    },
    Passthrough {
        columns: Vec<String>,
        fill: Vec<f64>,
    },
}

impl Step {
    pub fn columns(&self) -> &[String] {
        match self {
            Step::MinMax { columns, .. }
            | Step::OneHot { columns, .. }
            | Step::Ordinal { columns, .. }
            | Step::Passthrough { columns, .. } => columns,
        }
    }

    fn width(&self) -> usize {
        match self {
            Step::OneHot {
                categories,
                drop_first,
                ..
            } => categories
                .iter()
                .map(|c| if *drop_first { c.len().saturating_sub(1) } else { c.len() })
                .sum(),
            other => other.columns().len(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let n = self.columns().len();
        let check_len = |what: &str, len: usize| {
            if len == n {
                Ok(())
            } else {
                Err(format!("{} has {} entries for {} columns", what, len, n))
            }
        };

        match self {
            Step::MinMax {
                data_min,
                data_max,
                fill,
                ..
            } => {
                check_len("data_min", data_min.len())?;
                check_len("data_max", data_max.len())?;
                check_len("fill", fill.len())?;
                for (i, (lo, hi)) in data_min.iter().zip(data_max).enumerate() {
                    if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                        return Err(format!("invalid range [{}, {}] for {}", lo, hi, self.columns()[i]));
                    }
                }
                finite("fill", fill)
            }
            Step::OneHot { categories, .. } => {
                check_len("categories", categories.len())?;
                if categories.iter().any(Vec::is_empty) {
                    return Err("one_hot step has an empty category list".to_string());
                }
                Ok(())
            }
            Step::Ordinal {
                categories, fill, ..
            } => {
                check_len("categories", categories.len())?;
                check_len("fill", fill.len())?;
                finite("fill", fill)
            }
            Step::Passthrough { fill, .. } => {
                check_len("fill", fill.len())?;
                finite("fill", fill)
            }
        }
    }

    fn apply(&self, record: &Record, out: &mut Vec<f64>) -> Result<(), SchemaMismatchError> {
        match self {
            Step::MinMax {
                columns,
                data_min,
                data_max,
                fill,
            } => {
                for (i, name) in columns.iter().enumerate() {
                    let x = numeric(record, name)?.unwrap_or(fill[i]);
                    let range = data_max[i] - data_min[i];
                    out.push(if range > 0.0 { (x - data_min[i]) / range } else { 0.0 });
                }
            }
            Step::OneHot {
                columns,
                categories,
                drop_first,
            } => {
                for (name, cats) in columns.iter().zip(categories) {
                    let value = categorical(record, name)?;
                    let skip = usize::from(*drop_first);
                    for cat in cats.iter().skip(skip) {
                        let hot = value.as_deref() == Some(cat.as_str());
                        out.push(if hot { 1.0 } else { 0.0 });
                    }
                }
            }
            Step::Ordinal {
                columns,
                categories,
                fill,
            } => {
                for (i, (name, cats)) in columns.iter().zip(categories).enumerate() {
                    let value = categorical(record, name)?;
                    let index = value
                        .as_deref()
                        .and_then(|v| cats.iter().position(|c| c == v))
                        .map(|idx| idx as f64);
                    out.push(index.unwrap_or(fill[i]));
                }
            }
            Step::Passthrough { columns, fill } => {
                for (i, name) in columns.iter().enumerate() {
                    out.push(numeric(record, name)?.unwrap_or(fill[i]));
                }
            }
        }
        Ok(())
    }

    fn names(&self, out: &mut Vec<String>) {
        match self {
            Step::OneHot {
                columns,
                categories,
                drop_first,
            } => {
                for (name, cats) in columns.iter().zip(categories) {
                    for cat in cats.iter().skip(usize::from(*drop_first)) {
                        out.push(format!("{}_{}", name, cat));
                    }
                }
            }
            other => out.extend(other.columns().iter().cloned()),
        }
    }
}

impl Preprocessor {
    /// Checks internal consistency of a freshly deserialized artifact.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("preprocessor has no steps".to_string());
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| format!("step {}: {}", i, e))?;
        }
        Ok(())
    }

    pub fn n_features_out(&self) -> usize {
        self.steps.iter().map(Step::width).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_features_out());
        for step in &self.steps {
            step.names(&mut names);
        }
        names
    }

    /// Every column a cleaned record must carry.
    pub fn input_columns(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.columns().iter().map(String::as_str))
            .collect()
    }

    pub fn transform(&self, record: &Record) -> Result<Vec<f64>, SchemaMismatchError> {
        let mut features = Vec::with_capacity(self.n_features_out());
        for step in &self.steps {
            step.apply(record, &mut features)?;
        }
        Ok(features)
    }
}

fn finite(what: &str, values: &[f64]) -> Result<(), String> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(format!("{} contains a non-finite value", what))
    }
}

fn cell<'a>(record: &'a Record, name: &str) -> Result<&'a Cell, SchemaMismatchError> {
    record
        .get(name)
        .ok_or_else(|| SchemaMismatchError::MissingColumn(name.to_string()))
}

fn numeric(record: &Record, name: &str) -> Result<Option<f64>, SchemaMismatchError> {
    match cell(record, name)? {
        Cell::Number(n) => Ok(Some(*n).filter(|n| n.is_finite())),
        Cell::Missing => Ok(None),
        Cell::Text(_) => Err(SchemaMismatchError::NotNumeric(name.to_string())),
    }
}

fn categorical(record: &Record, name: &str) -> Result<Option<String>, SchemaMismatchError> {
    Ok(match cell(record, name)? {
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Missing => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> Preprocessor {
        Preprocessor {
            version: 1,
            steps: vec![
                Step::MinMax {
                    columns: vec!["age".into()],
                    data_min: vec![20.0],
                    data_max: vec![40.0],
                    fill: vec![30.0],
                },
                Step::OneHot {
                    columns: vec!["weather".into(), "is_weekend".into()],
                    categories: vec![
                        vec!["cloudy".into(), "fog".into(), "sunny".into()],
                        vec!["0".into(), "1".into()],
                    ],
                    drop_first: true,
                },
                Step::Ordinal {
                    columns: vec!["traffic".into()],
                    categories: vec![vec!["low".into(), "medium".into(), "high".into(), "jam".into()]],
                    fill: vec![1.0],
                },
                Step::Passthrough {
                    columns: vec!["vehicle_condition".into()],
                    fill: vec![1.0],
                },
            ],
        }
    }

    fn record() -> Record {
        Record::new()
            .with("age", Cell::Number(25.0))
            .with("weather", Cell::text("sunny"))
            .with("is_weekend", Cell::Number(1.0))
            .with("traffic", Cell::text("jam"))
            .with("vehicle_condition", Cell::Number(2.0))
    }

    #[test]
    fn test_transform_layout() {
        let p = preprocessor();

        assert_eq!(p.n_features_out(), 6);
        assert_eq!(
            p.feature_names(),
            vec!["age", "weather_fog", "weather_sunny", "is_weekend_1", "traffic", "vehicle_condition"]
        );
        assert_eq!(p.transform(&record()).unwrap(), vec![0.25, 0.0, 1.0, 1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_missing_values_use_fitted_fill() {
        let record = record()
            .with("age", Cell::Missing)
            .with("weather", Cell::Missing)
            .with("traffic", Cell::text("gridlock"))
            .with("vehicle_condition", Cell::Missing);

        let features = preprocessor().transform(&record).unwrap();

        assert_eq!(features, vec![0.5, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_absent_column_is_schema_mismatch() {
        let mut record = record();
        record.remove("traffic");

        assert_eq!(
            preprocessor().transform(&record).unwrap_err(),
            SchemaMismatchError::MissingColumn("traffic".into())
        );
    }

    #[test]
    fn test_text_in_numeric_column_is_schema_mismatch() {
        let record = record().with("age", Cell::text("thirty"));

        assert_eq!(
            preprocessor().transform(&record).unwrap_err(),
            SchemaMismatchError::NotNumeric("age".into())
        );
    }

    #[test]
    fn test_validate_rejects_inconsistent_step() {
        let mut p = preprocessor();
        p.steps.push(Step::MinMax {
            columns: vec!["distance".into()],
            data_min: vec![10.0],
            data_max: vec![1.0],
            fill: vec![3.0],
        });

        assert!(p.validate().unwrap_err().contains("invalid range"));
        assert!(preprocessor().validate().is_ok());
    }

    #[test]
    fn test_deserializes_tagged_steps() {
        let json = r#"{
            "steps": [
                {"kind": "passthrough", "columns": ["multiple_deliveries"], "fill": [1.0]}
            ]
        }"#;

        let p: Preprocessor = serde_json::from_str(json).unwrap();

        assert_eq!(p.version, 1);
        assert_eq!(p.input_columns(), vec!["multiple_deliveries"]);
    }
}
