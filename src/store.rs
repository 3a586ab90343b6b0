//! Persistent record store: durable JSON-backed tables.
//!
//! This module provides:
//! - In-memory state for the four tables (keys, usage, tombstones, audit
//!   log) behind a single `RwLock`
//! - Atomic-per-table persistence (write to a temp file, then rename over
//!   the canonical file, so no reader ever observes a partial table)
//! - A timestamped full snapshot after every successful mutation for
//!   point-in-time recovery
//!
//! # Concurrency
//!
//! Every mutating lifecycle operation runs its entire check-then-write
//! sequence inside [`KeyStore::mutate`], which holds the write lock until
//! the tables are persisted. Two concurrent activations of the same key
//! therefore cannot both observe it as unbound. Read-side projections use
//! [`KeyStore::read`] and only take the read lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::audit::{AuditEntry, MAX_AUDIT_ENTRIES};
use crate::models::key::{DeletedKeyRecord, KeyRecord, UsageRecord};

const KEYS_FILE: &str = "keys.json";
const USAGE_FILE: &str = "key_usage.json";
const DELETED_FILE: &str = "deleted_keys.json";
const LOGS_FILE: &str = "key_logs.json";
const SNAPSHOT_DIR: &str = "snapshots";

/// Maximum snapshot files retained; older ones are pruned after each
/// mutation so the snapshot directory stays bounded like the audit ring.
pub const MAX_SNAPSHOTS: usize = 50;

/// The four in-memory tables.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    /// Live key records by key id.
    pub keys: HashMap<String, KeyRecord>,

    /// Usage statistics by key id (1:1 with `keys`).
    pub key_usage: HashMap<String, UsageRecord>,

    /// Tombstones by key id. An id present here is permanently inert.
    pub deleted_keys: HashMap<String, DeletedKeyRecord>,

    /// Append-only audit log, capped at [`MAX_AUDIT_ENTRIES`].
    pub key_logs: Vec<AuditEntry>,
}

impl StoreState {
    /// Append an audit entry, dropping the oldest entries past the cap.
    pub fn push_log(&mut self, entry: AuditEntry) {
        self.key_logs.push(entry);
        if self.key_logs.len() > MAX_AUDIT_ENTRIES {
            let excess = self.key_logs.len() - MAX_AUDIT_ENTRIES;
            self.key_logs.drain(..excess);
        }
    }
}

/// JSON-file-backed key store.
pub struct KeyStore {
    data_dir: PathBuf,
    state: RwLock<StoreState>,

    /// Last snapshot stamp handed out, kept strictly increasing so two
    /// mutations in the same millisecond never share a snapshot name.
    snapshot_clock: AtomicI64,
}

impl KeyStore {
    /// Open the store rooted at `data_dir`, creating directories as needed.
    ///
    /// Loads the canonical table files when present. When the keys table
    /// is missing but local snapshots exist (e.g., the canonical files
    /// were lost), falls back to the newest snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreIo` if directories cannot be created or an existing
    /// table file cannot be read or parsed.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join(SNAPSHOT_DIR)).await?;

        let keys_path = data_dir.join(KEYS_FILE);
        let state = if fs::try_exists(&keys_path).await? {
            StoreState {
                keys: read_table(&keys_path).await?,
                key_usage: read_table(&data_dir.join(USAGE_FILE)).await?,
                deleted_keys: read_table(&data_dir.join(DELETED_FILE)).await?,
                key_logs: read_table(&data_dir.join(LOGS_FILE)).await?,
            }
        } else if let Some(snapshot_path) = latest_snapshot(&data_dir.join(SNAPSHOT_DIR)).await? {
            tracing::warn!(
                "Canonical tables missing, recovering from snapshot {}",
                snapshot_path.display()
            );
            read_table(&snapshot_path).await?
        } else {
            StoreState::default()
        };

        Ok(Self {
            data_dir,
            state: RwLock::new(state),
            snapshot_clock: AtomicI64::new(0),
        })
    }

    /// Run a check-then-write sequence under the write lock and persist.
    ///
    /// The closure runs against a staged copy of the state. When it
    /// returns `Err`, or when persisting the result fails, the staged
    /// copy is discarded and the shared state stays exactly as it was
    /// (fail closed, no partial mutation). Only after every table is
    /// written atomically and a timestamped full snapshot is captured
    /// does the staged copy become the shared state.
    pub async fn mutate<F, T>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, AppError>,
    {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let out = op(&mut staged)?;
        self.persist(&staged).await?;
        *state = staged;
        Ok(out)
    }

    /// Run a read-only projection under the read lock.
    pub async fn read<F, T>(&self, op: F) -> T
    where
        F: FnOnce(&StoreState) -> T,
    {
        let state = self.state.read().await;
        op(&state)
    }

    /// Clone the full state (backup capture).
    pub async fn export(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Atomically replace the full state and persist it (restore path).
    ///
    /// The existing state is kept when persisting the replacement fails.
    pub async fn replace(&self, new_state: StoreState) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        self.persist(&new_state).await?;
        *state = new_state;
        Ok(())
    }

    /// Write all four tables atomically, then capture a snapshot.
    async fn persist(&self, state: &StoreState) -> Result<(), AppError> {
        write_table(&self.data_dir.join(KEYS_FILE), &state.keys).await?;
        write_table(&self.data_dir.join(USAGE_FILE), &state.key_usage).await?;
        write_table(&self.data_dir.join(DELETED_FILE), &state.deleted_keys).await?;
        write_table(&self.data_dir.join(LOGS_FILE), &state.key_logs).await?;

        // Monotonically named so the latest is trivially identifiable.
        // persist only runs under the write lock, so load/store cannot race.
        let now = Utc::now().timestamp_millis();
        let stamp = now.max(self.snapshot_clock.load(Ordering::Relaxed) + 1);
        self.snapshot_clock.store(stamp, Ordering::Relaxed);

        let name = format!("snapshot-{stamp}.json");
        let snapshot_dir = self.data_dir.join(SNAPSHOT_DIR);
        write_table(&snapshot_dir.join(name), state).await?;

        prune_snapshots(&snapshot_dir).await;
        Ok(())
    }
}

/// Read and parse one JSON table, defaulting when the file is absent.
async fn read_table<T: DeserializeOwned + Default>(path: &Path) -> Result<T, AppError> {
    if !fs::try_exists(path).await? {
        return Ok(T::default());
    }
    let bytes = fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::StoreIo(std::io::Error::other(e)))
}

/// Serialize and atomically replace one JSON table.
///
/// Writes to `<path>.tmp` first, then renames over the canonical file.
/// Rename is atomic on POSIX filesystems, so a crash mid-write leaves the
/// previous table intact.
async fn write_table<T: Serialize>(path: &Path, table: &T) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(table)
        .map_err(|e| AppError::StoreIo(std::io::Error::other(e)))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Find the snapshot file with the highest embedded timestamp.
async fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>, AppError> {
    let mut newest: Option<(i64, PathBuf)> = None;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(ts) = parse_snapshot_millis(name) {
            if newest.as_ref().is_none_or(|(best, _)| ts > *best) {
                newest = Some((ts, path));
            }
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Delete the oldest snapshots past [`MAX_SNAPSHOTS`].
///
/// Best-effort: the snapshot just written is durable regardless, so
/// pruning failures are logged and never fail the mutation.
async fn prune_snapshots(dir: &Path) {
    let mut stamps: Vec<(i64, PathBuf)> = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Snapshot prune skipped, cannot list {}: {e}", dir.display());
            return;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(ts) = parse_snapshot_millis(name) {
            stamps.push((ts, path));
        }
    }

    if stamps.len() <= MAX_SNAPSHOTS {
        return;
    }
    stamps.sort_by_key(|(ts, _)| *ts);
    let excess = stamps.len() - MAX_SNAPSHOTS;
    for (_, path) in stamps.drain(..excess) {
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("Snapshot prune failed for {}: {e}", path.display());
        }
    }
}

/// Extract the millisecond timestamp from `snapshot-<millis>.json`.
fn parse_snapshot_millis(name: &str) -> Option<i64> {
    name.strip_prefix("snapshot-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
