//! Shared test helpers for service tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use license_key_service::services::lifecycle_service;
use license_key_service::store::KeyStore;
use tempfile::TempDir;

/// Open a key store rooted in a fresh temporary directory.
///
/// The TempDir must stay alive as long as the store is used.
pub async fn temp_store() -> (TempDir, KeyStore) {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open(dir.path()).await.unwrap();
    (dir, store)
}

/// A fixed reference instant for deterministic expiry arithmetic.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
}

/// Generate a key at `t0()` and return its id.
pub async fn generate_at_t0(store: &KeyStore, issuer_id: i64, duration_days: i64) -> String {
    lifecycle_service::generate_key_at(store, issuer_id, None, duration_days, t0())
        .await
        .unwrap()
        .key_id
}
