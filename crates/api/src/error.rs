//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Identity headers missing or malformed.
    Unauthenticated,
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
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Not authenticated".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::CartNotFound(_)
        | DomainError::ProductNotFound(_)
        | DomainError::ProductUnavailable(_)
        | DomainError::InvoiceNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::CartExists(_)
        | DomainError::ProductExists(_)
        | DomainError::EmptyCart(_)
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::CartConflict(_) => (StatusCode::CONFLICT, err.to_string()),
        DomainError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
