//! Key lifecycle service - state transitions for license keys.
//!
//! This service owns the generate -> activate -> rebind -> revoke/delete
//! state machine. Every mutating operation executes its full
//! check-then-write sequence inside a single [`KeyStore::mutate`] call, so
//! the write lock covers the checks and no two concurrent requests can
//! both claim the same key.
//!
//! # Failure semantics
//!
//! Every operation fails closed: on any ambiguity (unknown key, bound
//! elsewhere, expired) the default is deny. The only idempotent successes
//! are revoke and repeat-activation from the already-bound machine.
//!
//! Each operation has an `*_at` variant taking an explicit `now` so expiry
//! arithmetic is deterministic under test; the plain wrappers pass
//! `Utc::now()`.

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};

use crate::error::AppError;
use crate::models::audit::{AuditEntry, AuditEvent};
use crate::models::key::{DeletedKeyRecord, KeyRecord, KeyType, UsageRecord};
use crate::store::KeyStore;

/// Length of generated key ids.
const KEY_ID_LEN: usize = 12;

/// Draw a random alphanumeric key id.
fn new_key_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_ID_LEN)
        .map(char::from)
        .collect()
}

/// Result of a successful generate.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub key_id: String,
    pub key_type: KeyType,
    pub channel_scope: Option<String>,
    pub duration_days: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct Activation {
    pub expires_at: DateTime<Utc>,
    pub channel_scope: Option<String>,
    pub key_type: KeyType,

    /// True when this call started the expiry clock (first activation).
    pub first_activation: bool,
}

/// Generate a fresh key.
///
/// # Process
///
/// 1. Validate the duration
/// 2. Produce a unique id colliding with neither live nor deleted keys
/// 3. Insert the key record (owner, clock, and machine all unset) and a
///    zeroed usage record
/// 4. Append a `generate` audit entry
///
/// Webhook/backup dispatch is the caller's job, after commit.
///
/// # Errors
///
/// - `InvalidRequest`: duration outside 1..=36500 days
/// - `StoreIo`: persistence failed
pub async fn generate_key(
    store: &KeyStore,
    issuer_id: i64,
    channel_scope: Option<String>,
    duration_days: i64,
) -> Result<GeneratedKey, AppError> {
    generate_key_at(store, issuer_id, channel_scope, duration_days, Utc::now()).await
}

pub async fn generate_key_at(
    store: &KeyStore,
    issuer_id: i64,
    channel_scope: Option<String>,
    duration_days: i64,
    now: DateTime<Utc>,
) -> Result<GeneratedKey, AppError> {
    if !(1..=36500).contains(&duration_days) {
        return Err(AppError::InvalidRequest(
            "Duration must be between 1 and 36500 days".to_string(),
        ));
    }

    store
        .mutate(move |state| {
            // Uniqueness must hold against both the live and the deleted
            // table, so keep drawing until the id is fresh.
            let mut key_id = new_key_id();
            while state.keys.contains_key(&key_id) || state.deleted_keys.contains_key(&key_id) {
                key_id = new_key_id();
            }

            let record = KeyRecord::new(key_id.clone(), issuer_id, channel_scope, duration_days, now);
            let generated = GeneratedKey {
                key_id: key_id.clone(),
                key_type: record.key_type,
                channel_scope: record.channel_scope.clone(),
                duration_days,
                created_at: now,
            };

            state.key_usage.insert(key_id.clone(), UsageRecord::new(now));
            state.keys.insert(key_id.clone(), record);
            state.push_log(AuditEntry::new(
                now,
                AuditEvent::Generate,
                key_id,
                Some(issuer_id),
                format!("duration_days={duration_days}"),
            ));

            Ok(generated)
        })
        .await
}

/// Activate a key for a specific machine.
///
/// # Check order (deterministic, first match wins)
///
/// 1. Deleted-table membership -> `DeletedKey`
/// 2. Existence -> `InvalidKey`
/// 3. `is_active` -> `RevokedKey`
/// 4. Bound to a different machine -> `MachineConflict`
/// 5. Expiry (only meaningful once activated) -> `ExpiredKey`
///
/// On the first activation the expiry clock starts (`expires_at = now +
/// duration`), the owner and machine are bound, and none of those fields
/// ever change again through this operation. Re-activation from the bound
/// machine is an idempotent re-confirmation: the clock does not move, but
/// the usage counter still increments.
pub async fn activate_key(
    store: &KeyStore,
    key_id: &str,
    machine_id: &str,
    user_id: i64,
) -> Result<Activation, AppError> {
    activate_key_at(store, key_id, machine_id, user_id, Utc::now()).await
}

pub async fn activate_key_at(
    store: &KeyStore,
    key_id: &str,
    machine_id: &str,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Activation, AppError> {
    let key_id = key_id.to_string();
    let machine_id = machine_id.to_string();

    store
        .mutate(move |state| {
            if state.deleted_keys.contains_key(&key_id) {
                return Err(AppError::DeletedKey);
            }
            let key = state.keys.get_mut(&key_id).ok_or(AppError::InvalidKey)?;
            if !key.is_active {
                return Err(AppError::RevokedKey);
            }
            if let Some(ref bound) = key.bound_machine_id {
                if bound != &machine_id {
                    return Err(AppError::MachineConflict);
                }
            }
            if key.is_expired_at(now) {
                return Err(AppError::ExpiredKey);
            }

            // All checks passed; mutate.
            let first_activation = key.activated_at.is_none();
            if first_activation {
                key.activated_at = Some(now);
                key.expires_at = Some(key.expiry_from(now));
                key.owner_user_id = Some(user_id);
                key.bound_machine_id = Some(machine_id.clone());
            }
            let activation = Activation {
                // Set on this call or a previous one; never absent here.
                expires_at: key.expires_at.ok_or(AppError::InvalidKey)?,
                channel_scope: key.channel_scope.clone(),
                key_type: key.key_type,
                first_activation,
            };

            let usage = state
                .key_usage
                .entry(key_id.clone())
                .or_insert_with(|| UsageRecord::new(now));
            usage.usage_count += 1;
            usage.last_activated_at = Some(now);
            usage.last_used_at = Some(now);

            state.push_log(AuditEntry::new(
                now,
                AuditEvent::Activate,
                key_id,
                Some(user_id),
                format!("machine={machine_id} first={first_activation}"),
            ));

            Ok(activation)
        })
        .await
}

/// Re-point an owned key's machine binding without resetting its clock.
///
/// Only the recorded owner may rebind; an unactivated key has no owner
/// yet, so rebinding it is denied. `expires_at` is never touched.
///
/// # Errors
///
/// `DeletedKey`, `InvalidKey`, `RevokedKey`, `ExpiredKey`,
/// `OwnershipMismatch`.
pub async fn rebind_key(
    store: &KeyStore,
    key_id: &str,
    user_id: i64,
    new_machine_id: &str,
) -> Result<(), AppError> {
    rebind_key_at(store, key_id, user_id, new_machine_id, Utc::now()).await
}

pub async fn rebind_key_at(
    store: &KeyStore,
    key_id: &str,
    user_id: i64,
    new_machine_id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let key_id = key_id.to_string();
    let new_machine_id = new_machine_id.to_string();

    store
        .mutate(move |state| {
            if state.deleted_keys.contains_key(&key_id) {
                return Err(AppError::DeletedKey);
            }
            let key = state.keys.get_mut(&key_id).ok_or(AppError::InvalidKey)?;
            if !key.is_active {
                return Err(AppError::RevokedKey);
            }
            if key.is_expired_at(now) {
                return Err(AppError::ExpiredKey);
            }
            if key.owner_user_id != Some(user_id) {
                return Err(AppError::OwnershipMismatch);
            }

            key.bound_machine_id = Some(new_machine_id.clone());

            let usage = state
                .key_usage
                .entry(key_id.clone())
                .or_insert_with(|| UsageRecord::new(now));
            usage.usage_count += 1;
            usage.last_used_at = Some(now);

            state.push_log(AuditEntry::new(
                now,
                AuditEvent::Rebind,
                key_id,
                Some(user_id),
                format!("machine={new_machine_id}"),
            ));

            Ok(())
        })
        .await
}

/// Revoke a key (idempotent soft-disable).
///
/// Sets `is_active = false`, keeping the record and its usage history.
/// Returns `false` when the key id is unknown (or already deleted).
pub async fn revoke_key(store: &KeyStore, key_id: &str) -> Result<bool, AppError> {
    revoke_key_at(store, key_id, Utc::now()).await
}

pub async fn revoke_key_at(
    store: &KeyStore,
    key_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let key_id = key_id.to_string();

    let result = store
        .mutate(move |state| {
            let key = state.keys.get_mut(&key_id).ok_or(AppError::InvalidKey)?;
            key.is_active = false;

            state.push_log(AuditEntry::new(now, AuditEvent::Revoke, key_id, None, ""));
            Ok(true)
        })
        .await;

    match result {
        Ok(revoked) => Ok(revoked),
        // Unknown key is a boolean outcome here, not a denial.
        Err(AppError::InvalidKey) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Hard-delete a key (irreversible tombstoning).
///
/// Moves the record into the deleted table with `deleted_at`/`deleted_by`
/// and drops its usage entry. Once tombstoned the id can never be
/// activated again, even if an identical string were regenerated. Returns
/// `false` when the key id is unknown or already deleted.
pub async fn delete_key(store: &KeyStore, key_id: &str, deleted_by: i64) -> Result<bool, AppError> {
    delete_key_at(store, key_id, deleted_by, Utc::now()).await
}

pub async fn delete_key_at(
    store: &KeyStore,
    key_id: &str,
    deleted_by: i64,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let key_id = key_id.to_string();

    let result = store
        .mutate(move |state| {
            let key = state.keys.remove(&key_id).ok_or(AppError::InvalidKey)?;
            state.key_usage.remove(&key_id);
            state.deleted_keys.insert(
                key_id.clone(),
                DeletedKeyRecord {
                    key,
                    deleted_at: now,
                    deleted_by,
                },
            );

            state.push_log(AuditEntry::new(
                now,
                AuditEvent::Delete,
                key_id,
                Some(deleted_by),
                "",
            ));
            Ok(true)
        })
        .await;

    match result {
        Ok(deleted) => Ok(deleted),
        Err(AppError::InvalidKey) => Ok(false),
        Err(e) => Err(e),
    }
}
