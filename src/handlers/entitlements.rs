//! Entitlement query endpoint.
//!
//! - GET /api/v1/entitlements/{user_id} - Access state and remaining time
//! - GET /api/v1/stats - Aggregate store statistics (admin)

use crate::{
    AppState,
    models::key::{EntitlementResponse, StoreStatsResponse},
    services::entitlement_service,
};
use axum::{
    Json,
    extract::{Path, State},
};

/// Entitlement status for a user.
///
/// # Response (200)
///
/// ```json
/// {
///   "has_access": true,
///   "active_keys": [
///     { "key_id": "aB3xK9mQ2rTz", "key_type": "monthly", "remaining_seconds": 2591940 }
///   ]
/// }
/// ```
///
/// Revoked and expired keys are absent from `active_keys`; a generated but
/// never-activated key appears with `remaining_seconds: null` (clock not
/// started). Callers deny access on any non-200 response.
pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<EntitlementResponse> {
    Json(entitlement_service::status(&state.store, user_id).await)
}

/// Aggregate store statistics.
///
/// # Response (200)
///
/// ```json
/// {
///   "total_keys": 12,
///   "active_keys": 10,
///   "revoked_keys": 2,
///   "deleted_keys": 3,
///   "total_usage": 48
/// }
/// ```
pub async fn stats(State(state): State<AppState>) -> Json<StoreStatsResponse> {
    Json(entitlement_service::store_stats(&state.store).await)
}
