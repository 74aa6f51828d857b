//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use registry::RegistryError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Selector(_) | DomainError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DomainError::Registry(registry_err) => match registry_err {
            RegistryError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            RegistryError::SlotExhausted { .. }
            | RegistryError::InvalidState { .. }
            | RegistryError::ConstraintViolation { .. } => (StatusCode::CONFLICT, err.to_string()),
            // Safe to retry: the transaction left no partial state.
            RegistryError::OperationTimeout => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            RegistryError::Database(_) | RegistryError::Migration(_) => {
                tracing::error!(error = %err, "registry failure");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        },
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Domain(DomainError::Registry(err))
    }
}
