//! Backup and restore endpoints (admin).
//!
//! - POST /api/v1/backup - Capture the full store, return (and upload) it
//! - POST /api/v1/restore - Replace the store from a backup payload

use crate::{
    AppState,
    error::AppError,
    models::backup::BackupPayload,
    services::backup_service,
};
use axum::{Json, extract::State};
use serde_json::json;

/// Capture a backup of the full store.
///
/// The payload is returned to the caller and, when a backup channel is
/// configured, uploaded to it as a detached best-effort task.
///
/// # Response (200)
///
/// ```json
/// {
///   "timestamp": "2026-08-30T12:00:00Z",
///   "keys": { "...": { } },
///   "usage": { "...": { } },
///   "deleted_keys": { },
///   "logs": [ ]
/// }
/// ```
pub async fn backup(State(state): State<AppState>) -> Json<BackupPayload> {
    let payload = backup_service::build_payload(&state.store).await;
    backup_service::spawn_backup_upload(&state);
    Json(payload)
}

/// Restore the store from a backup payload.
///
/// All-or-nothing: a payload missing the required `keys`/`usage` maps (or
/// with mistyped tables) is rejected with 422 and no state changes.
///
/// # Response (200)
///
/// ```json
/// { "restored": true }
/// ```
pub async fn restore(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    backup_service::restore_payload(&state.store, payload).await?;
    Ok(Json(json!({ "restored": true })))
}
