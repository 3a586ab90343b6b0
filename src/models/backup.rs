//! Full-store backup payload.
//!
//! One self-describing JSON document carrying every table. `keys` and
//! `usage` are mandatory; `deleted_keys` and `logs` default to empty so
//! older backups (written before those tables existed) still restore.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::audit::AuditEntry;
use crate::models::key::{DeletedKeyRecord, KeyRecord, UsageRecord};

/// Serialized snapshot of the whole record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupPayload {
    /// When the backup was captured.
    pub timestamp: DateTime<Utc>,

    pub keys: HashMap<String, KeyRecord>,

    pub usage: HashMap<String, UsageRecord>,

    #[serde(default)]
    pub deleted_keys: HashMap<String, DeletedKeyRecord>,

    #[serde(default)]
    pub logs: Vec<AuditEntry>,
}

impl BackupPayload {
    /// Parse and shape-check a raw JSON value.
    ///
    /// Restore is all-or-nothing: any missing required map or type
    /// mismatch rejects the whole payload before any state is touched.
    pub fn from_value(value: serde_json::Value) -> Result<Self, AppError> {
        serde_json::from_value(value).map_err(|e| AppError::MalformedBackupPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_map_rejected() {
        let value = json!({ "timestamp": Utc::now(), "keys": {} });
        assert!(matches!(
            BackupPayload::from_value(value),
            Err(AppError::MalformedBackupPayload(_))
        ));
    }

    #[test]
    fn optional_tables_default_to_empty() {
        let value = json!({ "timestamp": Utc::now(), "keys": {}, "usage": {} });
        let payload = BackupPayload::from_value(value).unwrap();
        assert!(payload.deleted_keys.is_empty());
        assert!(payload.logs.is_empty());
    }

    #[test]
    fn mistyped_table_rejected() {
        let value = json!({ "timestamp": Utc::now(), "keys": [], "usage": {} });
        assert!(BackupPayload::from_value(value).is_err());
    }
}
