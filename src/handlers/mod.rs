pub mod health;
pub mod home;
pub mod predict;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{PipelineError, ValidationError};

pub enum AppError {
    Validation(ValidationError),
    Pipeline(PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(err) => {
                tracing::info!(fields = ?err.fields(), "Rejected invalid request body");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": err.errors })),
                )
                    .into_response()
            }
            AppError::Pipeline(PipelineError::Cleaning(err)) => {
                tracing::warn!(error = %err, "Request could not be cleaned");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": err.to_string() })),
                )
                    .into_response()
            }
            AppError::Pipeline(PipelineError::SchemaMismatch(err)) => {
                tracing::error!(
                    error = %err,
                    "Cleaned record does not match the preprocessor; deployed cleaner and model artifacts disagree"
                );
                internal_error()
            }
            AppError::Pipeline(PipelineError::Regression(err)) => {
                tracing::error!(error = %err, "Regressor failed");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal Server Error" })),
    )
        .into_response()
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}
