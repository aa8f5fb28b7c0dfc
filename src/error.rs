//! Error taxonomy for the dispatch engine.
//!
//! Validation failures surface to the originating party; unknown-identity
//! operations and transport failures never do. No variant is process-fatal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed report or registration data. Carries the individual
    /// field-level failures for the client.
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    /// Lookup of an emergency or party that is not tracked.
    #[error("not found")]
    NotFound,
}

impl DispatchError {
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            errors,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { message, errors } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": message, "errors": errors })),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "message": "Not found" })),
            )
                .into_response(),
        }
    }
}
