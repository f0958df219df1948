use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A single offending field in a request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(field: &str, kind: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    /// Error about the body as a whole rather than one field.
    pub fn body(kind: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("request validation failed for {} field(s)", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().filter_map(FieldError::field).collect()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleaningError {
    #[error("missing input column: {0}")]
    MissingColumn(String),
    #[error("column {column} has invalid value {value:?}: {reason}")]
    InvalidValue {
        column: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaMismatchError {
    #[error("cleaned record lacks expected column: {0}")]
    MissingColumn(String),
    #[error("column {0} holds text where a number was expected")]
    NotNumeric(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("feature vector has {actual} values, regressor expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("regressor produced a non-finite value: {0}")]
    NonFinite(f64),
}

/// Anything that can fail a single prediction once the body is validated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Cleaning(#[from] CleaningError),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error(transparent)]
    Regression(#[from] RegressionError),
}

#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("preprocessor produces {preprocessor} features but regressor expects {regressor}")]
    Incompatible { preprocessor: usize, regressor: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("request to tracking server failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("tracking server returned {status} for {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to read artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tracking configuration: {0}")]
    Config(String),
}
