use crate::models::{ApiResponse, TransactionStatus};
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RailError>;

#[derive(Error, Debug)]
pub enum RailError {
    #[error("Quote not found")]
    QuoteNotFound(String),

    #[error("Transaction not found")]
    TransactionNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Quote has expired")]
    QuoteExpired(String),

    #[error("Quote has already been confirmed")]
    QuoteAlreadyConfirmed(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Unauthorized")]
    Unauthorized,

    /// Carries the operation-level message shown to callers; the cause is
    /// logged where the fault is caught.
    #[error("{0}")]
    Internal(String),
}

/// Failures of the in-memory stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Record not found: {0}")]
    Missing(String),
}

impl From<validator::ValidationErrors> for RailError {
    fn from(err: validator::ValidationErrors) -> Self {
        RailError::Validation(err.to_string())
    }
}

impl ResponseError for RailError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        tracing::debug!(error_type = self.error_type(), "Request failed: {}", self);

        HttpResponse::build(status_code)
            .json(ApiResponse::<()>::failure(status_code, self.to_string()))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RailError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
            RailError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            RailError::Validation(_) => StatusCode::BAD_REQUEST,
            RailError::QuoteExpired(_) => StatusCode::GONE,
            RailError::QuoteAlreadyConfirmed(_) => StatusCode::CONFLICT,
            RailError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
            RailError::Unauthorized => StatusCode::UNAUTHORIZED,
            RailError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl RailError {
    pub fn error_type(&self) -> &str {
        match self {
            RailError::QuoteNotFound(_) => "not_found",
            RailError::TransactionNotFound(_) => "not_found",
            RailError::Validation(_) => "validation_error",
            RailError::QuoteExpired(_) => "quote_expired",
            RailError::QuoteAlreadyConfirmed(_) => "duplicate_error",
            RailError::InvalidStatusTransition { .. } => "invalid_status",
            RailError::Unauthorized => "unauthorized",
            RailError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_not_found_envelope() {
        let err = RailError::TransactionNotFound("tx123".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["message"], "Transaction not found");
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_internal_error_keeps_operation_message() {
        let err = RailError::Internal("Error generating quote".to_string());
        assert_eq!(err.to_string(), "Error generating quote");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_type(), "internal_error");
    }

    #[test]
    fn test_transition_message() {
        let err = RailError::InvalidStatusTransition {
            from: TransactionStatus::Failed,
            to: TransactionStatus::Success,
        };
        assert_eq!(err.to_string(), "Invalid status transition: FAILED -> SUCCESS");
    }
}
