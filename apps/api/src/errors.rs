use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::intake::reader::ExtractionError;
use crate::ledger::LedgerError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed or oversized multipart body. The status comes from axum:
    /// 413 when the body limit was hit, 400 otherwise.
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Auth provider error: {0}")]
    Auth(#[from] AuthError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Multipart(e) => {
                let status = e.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "MULTIPART_ERROR"
                };
                tracing::warn!("Rejected multipart body ({status}): {e}");
                (status, code, e.body_text())
            }
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTRACTION_ERROR",
                    "Error extracting text".to_string(),
                )
            }
            AppError::Auth(AuthError::Rejected(msg)) => {
                (StatusCode::BAD_REQUEST, "AUTH_REJECTED", msg.clone())
            }
            AppError::Auth(e) => {
                tracing::error!("Auth provider error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_PROVIDER_ERROR",
                    "Internal server error".to_string(),
                )
            }
            AppError::Ledger(e) => {
                tracing::error!("Ledger error: {e}");
                (StatusCode::BAD_GATEWAY, "LEDGER_ERROR", e.to_string())
            }
            AppError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                format!("{what} is not configured"),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
