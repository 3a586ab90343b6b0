//! Entitlement query service - read-side projections.
//!
//! Everything here goes through [`KeyStore::read`]: these are pure
//! projections over the store state that tolerate concurrent writers and
//! never block the lifecycle manager.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::key::{
    ActiveKeyEntry, EntitlementResponse, KeyDetailResponse, KeyInfoResponse, StoreStatsResponse,
};
use crate::store::KeyStore;

/// Current access state and remaining time for a user.
///
/// Scans live keys owned by `user_id` that are active and either not yet
/// started (no expiry set) or not yet expired. `remaining_seconds` is
/// `None` for a key whose clock has not started.
pub async fn status(store: &KeyStore, user_id: i64) -> EntitlementResponse {
    status_at(store, user_id, Utc::now()).await
}

pub async fn status_at(
    store: &KeyStore,
    user_id: i64,
    now: DateTime<Utc>,
) -> EntitlementResponse {
    store
        .read(|state| {
            let active_keys: Vec<ActiveKeyEntry> = state
                .keys
                .values()
                .filter(|key| {
                    key.owner_user_id == Some(user_id)
                        && key.is_active
                        && !key.is_expired_at(now)
                })
                .map(|key| ActiveKeyEntry {
                    key_id: key.id.clone(),
                    key_type: key.key_type,
                    remaining_seconds: key.expires_at.map(|exp| (exp - now).num_seconds()),
                })
                .collect();

            EntitlementResponse {
                has_access: !active_keys.is_empty(),
                active_keys,
            }
        })
        .await
}

/// Public preflight projection for a single key.
///
/// Deleted ids report `exists = false`, indistinguishable from ids that
/// never existed (no information leak about tombstones).
pub async fn key_info(store: &KeyStore, key_id: &str) -> KeyInfoResponse {
    store
        .read(|state| match state.keys.get(key_id) {
            Some(key) => KeyInfoResponse::from(key),
            None => KeyInfoResponse::absent(),
        })
        .await
}

/// Full admin detail for a key: record merged with usage stats.
///
/// # Errors
///
/// `InvalidKey` when the id is not in the live table.
pub async fn key_detail(store: &KeyStore, key_id: &str) -> Result<KeyDetailResponse, AppError> {
    store
        .read(|state| {
            state
                .keys
                .get(key_id)
                .map(|key| KeyDetailResponse::from_records(key, state.key_usage.get(key_id)))
                .ok_or(AppError::InvalidKey)
        })
        .await
}

/// All keys generated by a given issuer, newest first.
pub async fn keys_issued_by(store: &KeyStore, issuer_id: i64) -> Vec<KeyDetailResponse> {
    store
        .read(|state| {
            let mut keys: Vec<KeyDetailResponse> = state
                .keys
                .values()
                .filter(|key| key.created_by == issuer_id)
                .map(|key| KeyDetailResponse::from_records(key, state.key_usage.get(&key.id)))
                .collect();
            keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            keys
        })
        .await
}

/// Aggregate store statistics.
pub async fn store_stats(store: &KeyStore) -> StoreStatsResponse {
    store
        .read(|state| {
            let total_keys = state.keys.len() as u64;
            let active_keys = state.keys.values().filter(|k| k.is_active).count() as u64;
            StoreStatsResponse {
                total_keys,
                active_keys,
                revoked_keys: total_keys - active_keys,
                deleted_keys: state.deleted_keys.len() as u64,
                total_usage: state.key_usage.values().map(|u| u.usage_count).sum(),
            }
        })
        .await
}
