// [apps/gateway/src/errors.rs]
/*!
 * =================================================================
 * APARATO: API ERROR TAXONOMY (ESTRATO L4)
 * RESPONSABILIDAD: TRADUCCIÓN DE FALLOS DE DOMINIO A RESPUESTAS HTTP
 * =================================================================
 */

use axum::{http::StatusCode, response::IntoResponse, Json};
use passkey_infra_crypto::CryptoError;
use passkey_infra_db::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("[API_FAULT]: VALIDATION -> {0}")]
    Validation(String),

    #[error("[API_FAULT]: UNAUTHORIZED -> {0}")]
    Unauthorized(String),

    #[error("[API_FAULT]: ADMIN_DISABLED")]
    AdminDisabled,

    #[error("[API_FAULT]: NOT_FOUND -> {0}")]
    NotFound(String),

    #[error("[API_FAULT]: CONFLICT -> {0}")]
    Conflict(String),

    #[error("[API_FAULT]: RATE_LIMITED")]
    RateLimited,

    #[error("[API_FAULT]: INTERNAL -> {0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::DeviceNotFound | DbError::SessionNotFound => ApiError::NotFound(error.to_string()),
            DbError::DeviceConflict(detail) => ApiError::Conflict(detail),
            DbError::SessionNotPending | DbError::InvalidState(_) => ApiError::Validation(error.to_string()),
            DbError::Validation(message) => ApiError::Validation(message),
            other => {
                if other.is_transient() {
                    ApiError::Internal(format!("retryable: {other}"))
                } else {
                    ApiError::Internal(other.to_string())
                }
            }
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(error: CryptoError) -> Self {
        ApiError::Unauthorized(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
            ApiError::AdminDisabled => (StatusCode::FORBIDDEN, "admin actions disabled in production".to_string()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded".to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
