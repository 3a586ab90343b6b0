//! Audit log endpoint (admin).

use crate::{AppState, models::audit::AuditEntry};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

fn default_limit() -> usize {
    50
}

/// Query parameters for the audit log.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Maximum entries to return (default 50, capped by the ring size).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Recent audit log entries, newest first.
///
/// The underlying log is a capped ring: entries older than the most recent
/// 1000 are gone.
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEntry>> {
    let entries = state
        .store
        .read(|s| {
            s.key_logs
                .iter()
                .rev()
                .take(query.limit)
                .cloned()
                .collect::<Vec<_>>()
        })
        .await;

    Json(entries)
}
