//! Admin key management HTTP handlers.
//!
//! This module implements the key-related admin endpoints:
//! - POST   /api/v1/keys - Generate a new key
//! - GET    /api/v1/keys?issuer_id= - List keys by issuer
//! - GET    /api/v1/keys/{id} - Full key detail (record + usage)
//! - POST   /api/v1/keys/{id}/revoke - Soft-disable a key
//! - DELETE /api/v1/keys/{id} - Hard-delete (tombstone) a key

use crate::{
    AppState,
    error::AppError,
    models::key::{GenerateKeyRequest, GenerateKeyResponse, KeyDetailResponse},
    models::notification::KeyEventData,
    services::{backup_service, entitlement_service, lifecycle_service, notify_service},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

/// Generate a new key.
///
/// # Request Body
///
/// ```json
/// {
///   "issuer_id": 1111,
///   "channel_scope": "940132",
///   "duration_days": 30
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "key_id": "aB3xK9mQ2rTz",
///   "key_type": "monthly",
///   "duration_days": 30,
///   "channel_scope": "940132",
///   "created_at": "2026-08-30T12:00:00Z"
/// }
/// ```
///
/// The key is generated unbound: no owner, no machine, no clock. All of
/// those are fixed at first activation.
pub async fn generate_key(
    State(state): State<AppState>,
    Json(request): Json<GenerateKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = lifecycle_service::generate_key(
        &state.store,
        request.issuer_id,
        request.channel_scope,
        request.duration_days,
    )
    .await?;

    tracing::info!(
        "Key {} generated by issuer {} ({} days)",
        generated.key_id,
        request.issuer_id,
        generated.duration_days
    );

    // Post-commit side effects, best-effort
    notify_service::spawn_notification(
        &state,
        "key.generated",
        KeyEventData {
            key_id: generated.key_id.clone(),
            key_type: generated.key_type,
            user_id: Some(request.issuer_id),
            expires_at: None,
        },
    );
    backup_service::spawn_backup_upload(&state);

    Ok((
        StatusCode::CREATED,
        Json(GenerateKeyResponse {
            key_id: generated.key_id,
            key_type: generated.key_type,
            duration_days: generated.duration_days,
            channel_scope: generated.channel_scope,
            created_at: generated.created_at,
        }),
    ))
}

/// Query parameters for listing keys.
#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub issuer_id: i64,
}

/// List all keys generated by an issuer, newest first.
pub async fn list_keys(
    State(state): State<AppState>,
    Query(query): Query<ListKeysQuery>,
) -> Json<Vec<KeyDetailResponse>> {
    Json(entitlement_service::keys_issued_by(&state.store, query.issuer_id).await)
}

/// Get full detail for a key (record merged with usage stats).
///
/// Returns 404 for unknown ids, including tombstoned ones.
pub async fn get_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<Json<KeyDetailResponse>, AppError> {
    let detail = entitlement_service::key_detail(&state.store, &key_id).await?;
    Ok(Json(detail))
}

/// Revoke a key (idempotent soft-disable).
///
/// # Response (200)
///
/// ```json
/// { "revoked": true }
/// ```
///
/// `"revoked": false` means the key id was unknown; repeated revocation of
/// a known key keeps returning `true`.
pub async fn revoke_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let revoked = lifecycle_service::revoke_key(&state.store, &key_id).await?;
    if revoked {
        tracing::info!("Key {key_id} revoked");
    }
    Ok(Json(json!({ "revoked": revoked })))
}

/// Query parameters for key deletion.
#[derive(Debug, Deserialize)]
pub struct DeleteKeyQuery {
    /// Identity recorded as `deleted_by` on the tombstone.
    #[serde(default)]
    pub deleted_by: i64,
}

/// Hard-delete a key (irreversible tombstoning).
///
/// # Response
///
/// - **204 No Content**: key moved to the tombstone table
/// - **404 Not Found**: key id unknown or already deleted
pub async fn delete_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Query(query): Query<DeleteKeyQuery>,
) -> Result<StatusCode, AppError> {
    let deleted = lifecycle_service::delete_key(&state.store, &key_id, query.deleted_by).await?;
    if deleted {
        tracing::info!("Key {key_id} deleted by {}", query.deleted_by);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::InvalidKey)
    }
}
