//! Audit log entries for key lifecycle events.
//!
//! The log is an append-only ring capped at [`MAX_AUDIT_ENTRIES`]: older
//! entries are dropped silently, trading unbounded history for bounded
//! growth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of audit entries retained (most recent first to go).
pub const MAX_AUDIT_ENTRIES: usize = 1000;

/// Lifecycle event recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Generate,
    Activate,
    Rebind,
    Revoke,
    Delete,
}

/// One audit log entry from the `key_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub event: AuditEvent,
    pub key_id: String,

    /// The user the event concerns (activating user, issuer, ...), when
    /// one is known.
    pub user_id: Option<i64>,

    /// Free-form context (machine id, duration, ...).
    pub details: String,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        ts: DateTime<Utc>,
        event: AuditEvent,
        key_id: impl Into<String>,
        user_id: Option<i64>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            event,
            key_id: key_id.into(),
            user_id,
            details: details.into(),
        }
    }
}
