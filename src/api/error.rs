//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::CoreError;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NotFound(_) => Self::not_found(message),
            CoreError::Validation(_) => Self::bad_request(message),
            CoreError::ExternalService(_) => Self::new(StatusCode::BAD_GATEWAY, message),
            CoreError::Timeout { .. } => Self::new(StatusCode::GATEWAY_TIMEOUT, message),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(_)) => Self::not_found(err.to_string()),
            Some(CoreError::Validation(_)) => Self::bad_request(err.to_string()),
            Some(CoreError::ExternalService(_)) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            Some(CoreError::Timeout { .. }) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string())
            }
            None => Self::internal(err.to_string()),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
