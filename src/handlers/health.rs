//! Health check endpoint for service monitoring.

use crate::AppState;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Number of live keys in the store
    pub keys: usize,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "keys": 42,
///   "timestamp": "2026-08-30T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Touching the store read lock verifies the state is reachable
    let keys = state.store.read(|s| s.keys.len()).await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        keys,
        timestamp: Utc::now(),
    })
}
