//! Public activation endpoints consumed by the desktop client.
//!
//! - POST /api/v1/activate - Bind a key to a user+machine, start its clock
//! - POST /api/v1/rebind - Move an owned key to new hardware
//! - GET  /api/v1/key-info/{id} - Preflight projection before activation

use crate::{
    AppState,
    error::AppError,
    models::key::{
        ActivateKeyRequest, ActivateKeyResponse, KeyInfoResponse, RebindKeyRequest,
        RebindKeyResponse,
    },
    models::notification::KeyEventData,
    services::{backup_service, entitlement_service, lifecycle_service, notify_service},
};
use axum::{
    Json,
    extract::{Path, State},
};

/// Activate a key for a specific machine.
///
/// # Request Body
///
/// ```json
/// {
///   "key": "aB3xK9mQ2rTz",
///   "machine_id": "9f2c1a0b3d4e5f60",
///   "user_id": 424242
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "success": true,
///   "expires_at": "2026-09-29T12:00:00Z",
///   "channel_scope": null
/// }
/// ```
///
/// # Denials
///
/// - **410** `deleted_key` - key was hard-deleted
/// - **404** `invalid_key` - key never existed
/// - **403** `revoked_key` / `expired_key`
/// - **409** `machine_conflict` - bound to another machine (the client
///   reacts by offering a rebind)
///
/// Notification and backup upload are dispatched after commit as detached
/// tasks; they never delay or fail this response.
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<ActivateKeyRequest>,
) -> Result<Json<ActivateKeyResponse>, AppError> {
    let activation = lifecycle_service::activate_key(
        &state.store,
        &request.key,
        &request.machine_id,
        request.user_id,
    )
    .await?;

    tracing::info!(
        "Key {} activated by user {} (first={})",
        request.key,
        request.user_id,
        activation.first_activation
    );

    // Post-commit side effects, best-effort
    notify_service::spawn_notification(
        &state,
        "key.activated",
        KeyEventData {
            key_id: request.key.clone(),
            key_type: activation.key_type,
            user_id: Some(request.user_id),
            expires_at: Some(activation.expires_at),
        },
    );
    backup_service::spawn_backup_upload(&state);

    Ok(Json(ActivateKeyResponse {
        success: true,
        expires_at: activation.expires_at,
        channel_scope: activation.channel_scope,
    }))
}

/// Rebind an owned key to new hardware.
///
/// Does not reset the expiry clock; only the machine binding moves.
///
/// # Request Body
///
/// ```json
/// {
///   "key": "aB3xK9mQ2rTz",
///   "user_id": 424242,
///   "machine_id": "0a1b2c3d4e5f6071"
/// }
/// ```
///
/// # Denials
///
/// **403** `ownership_mismatch` when the requesting user is not the
/// recorded owner, plus the same deleted/revoked/expired denials as
/// activation.
pub async fn rebind(
    State(state): State<AppState>,
    Json(request): Json<RebindKeyRequest>,
) -> Result<Json<RebindKeyResponse>, AppError> {
    lifecycle_service::rebind_key(
        &state.store,
        &request.key,
        request.user_id,
        &request.machine_id,
    )
    .await?;

    tracing::info!("Key {} rebound by user {}", request.key, request.user_id);

    Ok(Json(RebindKeyResponse { success: true }))
}

/// Public key preflight.
///
/// # Response (200)
///
/// ```json
/// { "exists": true, "owner_user_id": 424242, "is_active": true }
/// ```
///
/// Always 200; a missing or deleted key reports `"exists": false`.
pub async fn key_info(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Json<KeyInfoResponse> {
    Json(entitlement_service::key_info(&state.store, &key_id).await)
}
