//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Invalid request (validation error)
    BadRequest(String),
    /// Internal server error
    Internal(String),
    /// Error raised by the planner library
    Planner(PlannerError),
}

fn planner_error_response(err: PlannerError) -> (StatusCode, ApiError) {
    let message = err.to_string();
    match err {
        PlannerError::InvalidInput { context, .. } => (
            StatusCode::BAD_REQUEST,
            ApiError::new("INVALID_INPUT", message).with_details(context.to_string()),
        ),
        PlannerError::Parse { context, .. } => (
            StatusCode::BAD_REQUEST,
            ApiError::new("PARSE_ERROR", message).with_details(context.to_string()),
        ),
        PlannerError::Configuration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("CONFIGURATION_ERROR", message),
        ),
        PlannerError::Storage { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("STORAGE_ERROR", message),
        ),
        PlannerError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("IO_ERROR", message),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Planner(e) => {
                if !e.is_invalid_input() {
                    log::error!("Request failed: {}", e);
                }
                planner_error_response(e)
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<PlannerError> for AppError {
    fn from(err: PlannerError) -> Self {
        AppError::Planner(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
