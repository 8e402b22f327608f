//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use helplink_shared::StoreError;

use crate::auth::AuthError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    // Relay errors
    #[error("No admin available to receive messages")]
    NoAdminAvailable,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Validation
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),

            // Relay
            ApiError::NoAdminAvailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_ADMIN_AVAILABLE",
                self.to_string(),
            ),

            // Internal
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoAdminAvailable => ApiError::NoAdminAvailable,
            StoreError::NotFound(_) => ApiError::NotFound,
            StoreError::Database(msg) => ApiError::Database(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Unauthorized,
            AuthError::InvalidToken | AuthError::Expired => ApiError::InvalidToken,
            AuthError::UnknownSubject | AuthError::Disabled => ApiError::Unauthorized,
            AuthError::Store(e) => ApiError::from(e),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;

    #[test]
    fn test_no_admin_maps_to_service_unavailable() {
        let response = ApiError::NoAdminAvailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_error_conversion() {
        assert!(matches!(
            ApiError::from(StoreError::NoAdminAvailable),
            ApiError::NoAdminAvailable
        ));
        assert!(matches!(
            ApiError::from(StoreError::Database("boom".into())),
            ApiError::Database(_)
        ));
    }

    #[test]
    fn test_auth_error_conversion() {
        assert!(matches!(
            ApiError::from(AuthError::Expired),
            ApiError::InvalidToken
        ));
        assert!(matches!(
            ApiError::from(AuthError::UnknownSubject),
            ApiError::Unauthorized
        ));
    }
}
