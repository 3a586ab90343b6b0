//! Backup capture and all-or-nothing restore.

mod common;

use common::{generate_at_t0, t0, temp_store};
use license_key_service::error::AppError;
use license_key_service::services::{backup_service, entitlement_service, lifecycle_service};
use serde_json::json;

#[tokio::test]
async fn backup_restore_round_trip_preserves_observable_state() {
    let (_dir, store) = temp_store().await;
    let live = generate_at_t0(&store, 1, 30).await;
    let doomed = generate_at_t0(&store, 1, 7).await;
    lifecycle_service::activate_key_at(&store, &live, "m1", 42, t0())
        .await
        .unwrap();
    lifecycle_service::activate_key_at(&store, &live, "m1", 42, t0())
        .await
        .unwrap();
    lifecycle_service::delete_key_at(&store, &doomed, 1111, t0())
        .await
        .unwrap();

    let payload = backup_service::build_payload(&store).await;

    // Restore into a completely fresh store
    let (_dir2, restored) = temp_store().await;
    let value = serde_json::to_value(&payload).unwrap();
    backup_service::restore_payload(&restored, value).await.unwrap();

    let detail = entitlement_service::key_detail(&restored, &live)
        .await
        .unwrap();
    assert_eq!(detail.owner_user_id, Some(42));
    assert_eq!(detail.usage_count, 2);

    let (deleted_present, log_len) = restored
        .read(|s| (s.deleted_keys.contains_key(&doomed), s.key_logs.len()))
        .await;
    assert!(deleted_present);
    assert_eq!(log_len, 5);

    // And the deleted id stays inert after restore
    let err = lifecycle_service::activate_key_at(&restored, &doomed, "m1", 42, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DeletedKey));
}

#[tokio::test]
async fn malformed_payload_rejected_without_state_change() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    // Missing the required usage map
    let err = backup_service::restore_payload(&store, json!({ "timestamp": t0(), "keys": {} }))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MalformedBackupPayload(_)));

    // Mistyped keys table
    let err = backup_service::restore_payload(
        &store,
        json!({ "timestamp": t0(), "keys": [1, 2], "usage": {} }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::MalformedBackupPayload(_)));

    // Existing state untouched
    assert!(
        entitlement_service::key_detail(&store, &key_id)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn restore_replaces_existing_state() {
    let (_dir, source) = temp_store().await;
    let kept = generate_at_t0(&source, 1, 30).await;
    let payload = backup_service::build_payload(&source).await;

    let (_dir2, target) = temp_store().await;
    let stale = generate_at_t0(&target, 1, 30).await;

    backup_service::restore_payload(&target, serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();

    // Restore is a replacement, not a merge
    assert!(entitlement_service::key_detail(&target, &kept).await.is_ok());
    assert!(matches!(
        entitlement_service::key_detail(&target, &stale).await,
        Err(AppError::InvalidKey)
    ));
}
