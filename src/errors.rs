use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Standardized error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Application with order id CERT-20250101120000-A1B2C3 not found",
    "details": null,
    "timestamp": "2025-01-01T12:00:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details (validation errors in dev mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::error::DbErr;

    #[test]
    fn database_errors_hide_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("relation does not exist".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn gateway_errors_map_to_bad_gateway() {
        let err = ServiceError::GatewayError("upstream rejected payment".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.response_message().contains("upstream rejected"));
    }

    #[test]
    fn user_facing_errors_keep_message() {
        let err = ServiceError::ValidationError("certificates must not be empty".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.response_message().contains("certificates"));
    }
}
