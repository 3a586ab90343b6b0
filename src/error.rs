//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Domain denials**: `InvalidKey` through `OwnershipMismatch` are
///   expected business outcomes ("request denied"), returned as typed
///   results, never panics. Each one maps to a distinct error code so the
///   client can react appropriately (prompt a rebind, buy a new key, ...).
/// - **Infrastructure failures**: `StoreIo` and `MalformedBackupPayload`
///   are logged and abort the operation without partial mutation.
/// - **Authentication/validation**: invalid admin key or bad request data.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The key id does not exist in the live table.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Invalid key")]
    InvalidKey,

    /// The key was hard-deleted and is permanently inert.
    ///
    /// Returns HTTP 410 Gone.
    #[error("Key has been deleted")]
    DeletedKey,

    /// The key was revoked (soft-disabled, record retained).
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Key has been revoked")]
    RevokedKey,

    /// The key is already activated on another machine.
    ///
    /// Returns HTTP 409 Conflict. The desktop client matches on this
    /// message to offer an automatic rebind, so the wording is stable.
    #[error("Key is already activated on another machine")]
    MachineConflict,

    /// The key's expiry clock has run out.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Key has expired")]
    ExpiredKey,

    /// A rebind was requested by someone other than the recorded owner.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Key is owned by a different user")]
    OwnershipMismatch,

    /// A backup payload failed shape validation; existing state untouched.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Malformed backup payload: {0}")]
    MalformedBackupPayload(String),

    /// Disk read/write failure in the record store.
    ///
    /// Returns HTTP 500 Internal Server Error (details hidden from client).
    #[error("Store I/O error: {0}")]
    StoreIo(#[from] std::io::Error),

    /// Admin API key is missing, invalid, or malformed.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Callers treat any non-success status as "deny access", so every denial
/// path must go through this mapping rather than a bare status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidKey => (StatusCode::NOT_FOUND, "invalid_key", self.to_string()),
            AppError::DeletedKey => (StatusCode::GONE, "deleted_key", self.to_string()),
            AppError::RevokedKey => (StatusCode::FORBIDDEN, "revoked_key", self.to_string()),
            AppError::MachineConflict => {
                (StatusCode::CONFLICT, "machine_conflict", self.to_string())
            }
            AppError::ExpiredKey => (StatusCode::FORBIDDEN, "expired_key", self.to_string()),
            AppError::OwnershipMismatch => (
                StatusCode::FORBIDDEN,
                "ownership_mismatch",
                self.to_string(),
            ),
            AppError::MalformedBackupPayload(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "malformed_backup_payload",
                msg.clone(),
            ),
            AppError::StoreIo(ref e) => {
                tracing::error!("Store I/O failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
