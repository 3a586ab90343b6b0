//! Key records and API request/response types.
//!
//! This module defines:
//! - `KeyRecord`: the central entitlement token entity
//! - `UsageRecord`: per-key usage statistics (1:1 by key id)
//! - `DeletedKeyRecord`: tombstone snapshot for hard-deleted keys
//! - Request/response types for generate, activate, rebind, and queries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Durational classification assigned at generation.
///
/// Informational only; the actual lifetime is `duration_days`. Serialized
/// lowercase (`"daily"`, `"lifetime"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    General,
    Daily,
    Weekly,
    Monthly,
    Lifetime,
}

impl KeyType {
    /// Classify a key from its configured duration.
    #[must_use]
    pub fn classify(duration_days: i64) -> Self {
        match duration_days {
            1 => Self::Daily,
            7 => Self::Weekly,
            30 => Self::Monthly,
            d if d >= 3650 => Self::Lifetime,
            _ => Self::General,
        }
    }
}

/// A license key record from the `keys` table.
///
/// # Lifecycle
///
/// created (generate) -> pending, no clock running -> activated (clock
/// starts, machine bound) -> revoked or naturally expired -> deleted
/// (moved to the tombstone table).
///
/// `activated_at`, `expires_at`, `owner_user_id`, and `bound_machine_id`
/// are all unset until the first successful activation and are written
/// exactly once. `expires_at` never changes afterwards; a rebind only
/// moves `bound_machine_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Opaque 12-character alphanumeric token. Unique across live AND
    /// deleted keys.
    pub id: String,

    /// Owner bound at first activation. `None` until then, immutable after.
    pub owner_user_id: Option<i64>,

    /// Identity of the issuer that generated this key.
    pub created_by: i64,

    /// Optional restriction to a context (e.g., a channel id). Immutable.
    pub channel_scope: Option<String>,

    /// When the key was generated.
    pub created_at: DateTime<Utc>,

    /// Set exactly once, at first successful activation.
    pub activated_at: Option<DateTime<Utc>>,

    /// `activated_at + duration`. Set at first activation, NOT at
    /// generation: the duration is a pending promise until the clock
    /// starts.
    pub expires_at: Option<DateTime<Utc>>,

    /// Lifetime in days once activated.
    pub duration_days: i64,

    /// Machine bound at first activation. Changed only by rebind.
    pub bound_machine_id: Option<String>,

    /// True unless explicitly revoked. Revocation is non-destructive: the
    /// record remains, access is denied.
    pub is_active: bool,

    /// Durational classification assigned at generation.
    pub key_type: KeyType,
}

impl KeyRecord {
    /// Create a freshly generated, unactivated key record.
    #[must_use]
    pub fn new(
        id: String,
        created_by: i64,
        channel_scope: Option<String>,
        duration_days: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_user_id: None,
            created_by,
            channel_scope,
            created_at,
            activated_at: None,
            expires_at: None,
            duration_days,
            bound_machine_id: None,
            is_active: true,
            key_type: KeyType::classify(duration_days),
        }
    }

    /// Whether the expiry clock has run out at `now`.
    ///
    /// A key that was never activated has no clock running and is never
    /// considered expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    /// The expiry timestamp the key will carry once activated at `now`.
    #[must_use]
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.duration_days)
    }
}

/// Usage statistics from the `key_usage` table, 1:1 with `KeyRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub created_at: DateTime<Utc>,

    /// Last successful activation (first or repeat).
    pub last_activated_at: Option<DateTime<Utc>>,

    /// Last successful activate or rebind.
    pub last_used_at: Option<DateTime<Utc>>,

    /// Monotonic counter, incremented on every successful activate/rebind.
    pub usage_count: u64,
}

impl UsageRecord {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            last_activated_at: None,
            last_used_at: None,
            usage_count: 0,
        }
    }
}

/// Tombstone snapshot from the `deleted_keys` table.
///
/// Once an id appears here it is permanently inert: every lifecycle check
/// consults this table first, so even a hypothetically regenerated
/// identical id can never be activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedKeyRecord {
    /// Snapshot of the key record at deletion time.
    pub key: KeyRecord,

    pub deleted_at: DateTime<Utc>,

    /// Identity of the admin that deleted the key.
    pub deleted_by: i64,
}

/// Request to generate a new key.
///
/// # JSON Example
///
/// ```json
/// {
///   "issuer_id": 1111,
///   "channel_scope": "940132",
///   "duration_days": 30
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct GenerateKeyRequest {
    /// Identity of the issuing admin.
    pub issuer_id: i64,

    /// Optional context restriction recorded on the key.
    pub channel_scope: Option<String>,

    /// Lifetime in days once activated (1..=36500).
    pub duration_days: i64,
}

/// Response for a successful generate.
#[derive(Debug, Serialize)]
pub struct GenerateKeyResponse {
    pub key_id: String,
    pub key_type: KeyType,
    pub duration_days: i64,
    pub channel_scope: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to activate a key on a machine.
///
/// # JSON Example
///
/// ```json
/// {
///   "key": "aB3xK9mQ2rTz",
///   "machine_id": "9f2c1a0b3d4e5f60",
///   "user_id": 424242
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ActivateKeyRequest {
    pub key: String,
    pub machine_id: String,
    pub user_id: i64,
}

/// Response for a successful activation.
///
/// `expires_at` is always set: either just computed (first activation) or
/// the previously recorded value (idempotent re-confirmation from the
/// bound machine).
#[derive(Debug, Serialize)]
pub struct ActivateKeyResponse {
    pub success: bool,
    pub expires_at: DateTime<Utc>,
    pub channel_scope: Option<String>,
}

/// Request to rebind an owned key to new hardware.
#[derive(Debug, Deserialize)]
pub struct RebindKeyRequest {
    pub key: String,
    pub user_id: i64,
    pub machine_id: String,
}

/// Response for a successful rebind.
#[derive(Debug, Serialize)]
pub struct RebindKeyResponse {
    pub success: bool,
}

/// Public preflight projection of a key (no authentication required).
///
/// The desktop client calls this before activation to distinguish "key
/// never existed or was deleted" from server-side denial.
#[derive(Debug, Serialize)]
pub struct KeyInfoResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyType>,
}

impl KeyInfoResponse {
    /// Projection for an id absent from the live table (including deleted
    /// ids, which must look identical to never-existed ids here).
    #[must_use]
    pub fn absent() -> Self {
        Self {
            exists: false,
            owner_user_id: None,
            is_active: None,
            expires_at: None,
            key_type: None,
        }
    }
}

impl From<&KeyRecord> for KeyInfoResponse {
    fn from(key: &KeyRecord) -> Self {
        Self {
            exists: true,
            owner_user_id: key.owner_user_id,
            is_active: Some(key.is_active),
            expires_at: key.expires_at,
            key_type: Some(key.key_type),
        }
    }
}

/// Full admin-facing key detail: the record merged with its usage stats.
#[derive(Debug, Serialize)]
pub struct KeyDetailResponse {
    pub id: String,
    pub owner_user_id: Option<i64>,
    pub created_by: i64,
    pub channel_scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub duration_days: i64,
    pub bound_machine_id: Option<String>,
    pub is_active: bool,
    pub key_type: KeyType,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

impl KeyDetailResponse {
    /// Merge a key record with its usage record (if any).
    #[must_use]
    pub fn from_records(key: &KeyRecord, usage: Option<&UsageRecord>) -> Self {
        Self {
            id: key.id.clone(),
            owner_user_id: key.owner_user_id,
            created_by: key.created_by,
            channel_scope: key.channel_scope.clone(),
            created_at: key.created_at,
            activated_at: key.activated_at,
            expires_at: key.expires_at,
            duration_days: key.duration_days,
            bound_machine_id: key.bound_machine_id.clone(),
            is_active: key.is_active,
            key_type: key.key_type,
            last_used_at: usage.and_then(|u| u.last_used_at),
            usage_count: usage.map(|u| u.usage_count).unwrap_or(0),
        }
    }
}

/// One entry in the entitlement projection.
#[derive(Debug, Serialize)]
pub struct ActiveKeyEntry {
    pub key_id: String,
    pub key_type: KeyType,

    /// `expires_at - now`, or `None` for a key whose clock has not started
    /// (generated but never activated). Callers must not treat `None` as
    /// expired.
    pub remaining_seconds: Option<i64>,
}

/// Entitlement projection for a user.
///
/// # JSON Example
///
/// ```json
/// {
///   "has_access": true,
///   "active_keys": [
///     { "key_id": "aB3xK9mQ2rTz", "key_type": "monthly", "remaining_seconds": 2591940 }
///   ]
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub has_access: bool,
    pub active_keys: Vec<ActiveKeyEntry>,
}

/// Aggregate store statistics (admin dashboard).
#[derive(Debug, Serialize)]
pub struct StoreStatsResponse {
    pub total_keys: u64,
    pub active_keys: u64,
    pub revoked_keys: u64,
    pub deleted_keys: u64,
    pub total_usage: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_standard_durations() {
        assert_eq!(KeyType::classify(1), KeyType::Daily);
        assert_eq!(KeyType::classify(7), KeyType::Weekly);
        assert_eq!(KeyType::classify(30), KeyType::Monthly);
        assert_eq!(KeyType::classify(3650), KeyType::Lifetime);
        assert_eq!(KeyType::classify(14), KeyType::General);
    }

    #[test]
    fn unactivated_key_never_expires() {
        let key = KeyRecord::new("k".into(), 1, None, 1, Utc::now());
        assert!(!key.is_expired_at(Utc::now() + Duration::days(400)));
    }

    #[test]
    fn key_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&KeyType::Lifetime).unwrap(),
            "\"lifetime\""
        );
    }
}
