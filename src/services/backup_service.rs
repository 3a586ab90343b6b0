//! Backup/restore subsystem.
//!
//! Serializes the full store into one self-describing payload, pushes it
//! to an external durable channel (attachment-style multipart upload), and
//! restores from the channel's most recent valid snapshot at startup.
//!
//! Upload failures are logged and swallowed: backups are not part of the
//! entitlement contract and must never gate a lifecycle decision.

use std::time::Duration;

use chrono::Utc;

use crate::AppState;
use crate::error::AppError;
use crate::models::backup::BackupPayload;
use crate::store::{KeyStore, StoreState};

/// Timeout for backup channel requests (upload and fetch).
const BACKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Capture the full store as a backup payload.
pub async fn build_payload(store: &KeyStore) -> BackupPayload {
    let state = store.export().await;
    BackupPayload {
        timestamp: Utc::now(),
        keys: state.keys,
        usage: state.key_usage,
        deleted_keys: state.deleted_keys,
        logs: state.key_logs,
    }
}

/// Validate a raw payload and atomically replace the store state.
///
/// All-or-nothing: a malformed payload is rejected before any existing
/// state is touched.
///
/// # Errors
///
/// - `MalformedBackupPayload`: shape validation failed
/// - `StoreIo`: persisting the restored state failed
pub async fn restore_payload(
    store: &KeyStore,
    value: serde_json::Value,
) -> Result<(), AppError> {
    let payload = BackupPayload::from_value(value)?;
    let restored = payload.keys.len();

    store
        .replace(StoreState {
            keys: payload.keys,
            key_usage: payload.usage,
            deleted_keys: payload.deleted_keys,
            key_logs: payload.logs,
        })
        .await?;

    tracing::info!("Restored {restored} keys from backup payload");
    Ok(())
}

/// Upload a backup payload to the external channel as a JSON attachment.
///
/// Best-effort: timeouts, transport errors, and non-2xx responses are
/// logged and swallowed.
pub async fn upload_backup(client: &reqwest::Client, url: &str, payload: &BackupPayload) {
    let json = match serde_json::to_vec(payload) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Backup serialization failed: {e}");
            return;
        }
    };

    let part = match reqwest::multipart::Part::bytes(json)
        .file_name("keys_backup.json")
        .mime_str("application/json")
    {
        Ok(part) => part,
        Err(e) => {
            tracing::error!("Backup attachment build failed: {e}");
            return;
        }
    };
    let form = reqwest::multipart::Form::new().part("file", part);

    match client
        .post(url)
        .multipart(form)
        .timeout(BACKUP_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("Backup uploaded ({} keys)", payload.keys.len());
        }
        Ok(resp) => {
            tracing::warn!("Backup upload rejected: HTTP {}", resp.status());
        }
        Err(e) => {
            tracing::warn!("Backup upload failed: {e}");
        }
    }
}

/// Fetch the most recent backup payload from the external channel.
///
/// Returns `None` on any failure (unreachable channel, non-2xx, malformed
/// body); startup then falls back to local state.
pub async fn fetch_remote_backup(client: &reqwest::Client, url: &str) -> Option<BackupPayload> {
    let resp = client
        .get(url)
        .timeout(BACKUP_TIMEOUT)
        .send()
        .await
        .inspect_err(|e| tracing::warn!("Backup fetch failed: {e}"))
        .ok()?;

    if !resp.status().is_success() {
        tracing::warn!("Backup fetch rejected: HTTP {}", resp.status());
        return None;
    }

    let value: serde_json::Value = resp
        .json()
        .await
        .inspect_err(|e| tracing::warn!("Backup fetch body unreadable: {e}"))
        .ok()?;

    match BackupPayload::from_value(value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Remote backup payload invalid, ignoring: {e}");
            None
        }
    }
}

/// Restore from the external channel at process start, if configured.
///
/// The remote snapshot, when present and valid, wins over local state
/// (the local snapshot fallback already happened inside `KeyStore::open`).
pub async fn restore_on_startup(state: &AppState) -> Result<(), AppError> {
    let Some(ref url) = state.config.backup_url else {
        return Ok(());
    };

    if let Some(payload) = fetch_remote_backup(&state.http, url).await {
        let value = serde_json::to_value(&payload)
            .map_err(|e| AppError::MalformedBackupPayload(e.to_string()))?;
        restore_payload(&state.store, value).await?;
    } else {
        tracing::info!("No remote backup found, using local state");
    }
    Ok(())
}

/// Capture and upload a backup now (after high-value mutations).
///
/// Spawned detached so the lifecycle response never waits on it.
pub fn spawn_backup_upload(state: &AppState) {
    let Some(url) = state.config.backup_url.clone() else {
        return;
    };
    let store = state.store.clone();
    let client = state.http.clone();

    tokio::spawn(async move {
        let payload = build_payload(&store).await;
        upload_backup(&client, &url, &payload).await;
    });
}

/// Periodic backup task. Ticks until the shutdown channel fires.
pub async fn run_periodic_backup(
    state: AppState,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let Some(url) = state.config.backup_url.clone() else {
        return;
    };
    let mut interval =
        tokio::time::interval(Duration::from_secs(state.config.backup_interval_secs.max(60)));
    // First tick fires immediately; skip it, the startup restore just ran.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let payload = build_payload(&state.store).await;
                upload_backup(&state.http, &url, &payload).await;
            }
            _ = shutdown.changed() => {
                tracing::info!("Backup timer stopped");
                return;
            }
        }
    }
}
