//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::{ModelError, StoreError, ValidationError};

/// Errors a handler can return; each maps to a status code and JSON body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body failed field checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No prediction with the requested id.
    #[error("prediction not found")]
    NotFound,

    /// The model could not score the input.
    #[error("inference failed: {0}")]
    Model(#[from] ModelError),

    /// The prediction store failed.
    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    /// `metrics.json` does not exist.
    #[error("metrics file not found")]
    MetricsNotFound,

    /// `metrics.json` is not valid JSON.
    #[error("metrics file is not valid JSON")]
    MetricsInvalid,

    /// `metrics.json` could not be read.
    #[error("metrics file unreadable: {0}")]
    MetricsUnreadable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "message": "Prediction not found" }),
            ),
            ApiError::Model(e) => {
                error!("Inference failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Prediction failed", "message": e.to_string() }),
                )
            }
            ApiError::Store(e) => {
                error!("Prediction store failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error" }),
                )
            }
            ApiError::MetricsNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Metrics file not found" }),
            ),
            ApiError::MetricsInvalid => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid JSON format in metrics file" }),
            ),
            ApiError::MetricsUnreadable(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Error loading metrics", "message": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
