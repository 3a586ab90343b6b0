//! Lifecycle state machine tests: generate, activate, rebind, revoke,
//! delete, and the check ordering between them.

mod common;

use chrono::Duration;
use common::{generate_at_t0, t0, temp_store};
use license_key_service::error::AppError;
use license_key_service::services::{entitlement_service, lifecycle_service};

#[tokio::test]
async fn generate_leaves_clock_and_owner_unset() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1111, 30).await;

    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.created_by, 1111);
    assert!(detail.owner_user_id.is_none());
    assert!(detail.activated_at.is_none());
    assert!(detail.expires_at.is_none());
    assert!(detail.bound_machine_id.is_none());
    assert!(detail.is_active);
    assert_eq!(detail.usage_count, 0);
}

#[tokio::test]
async fn generate_rejects_bad_duration() {
    let (_dir, store) = temp_store().await;
    for days in [0, -5, 36501] {
        let err = lifecycle_service::generate_key_at(&store, 1, None, days, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}

#[tokio::test]
async fn first_activation_starts_clock_and_binds() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 1).await;

    let activation = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    assert!(activation.first_activation);
    assert_eq!(activation.expires_at, t0() + Duration::seconds(86400));

    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.owner_user_id, Some(42));
    assert_eq!(detail.bound_machine_id.as_deref(), Some("m1"));
    assert_eq!(detail.activated_at, Some(t0()));
}

#[tokio::test]
async fn reactivation_is_idempotent_but_counts_usage() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    let first = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    let second =
        lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0() + Duration::hours(1))
            .await
            .unwrap();

    // The clock does not move on re-confirmation
    assert_eq!(first.expires_at, second.expires_at);
    assert!(!second.first_activation);

    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.usage_count, 2);
}

#[tokio::test]
async fn activation_denied_from_other_machine() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    lifecycle_service::activate_key_at(&store, &key_id, "machine_a", 42, t0())
        .await
        .unwrap();
    let err = lifecycle_service::activate_key_at(&store, &key_id, "machine_b", 42, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MachineConflict));
}

#[tokio::test]
async fn rebind_moves_machine_without_resetting_clock() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    let activation = lifecycle_service::activate_key_at(&store, &key_id, "machine_a", 42, t0())
        .await
        .unwrap();

    lifecycle_service::rebind_key_at(&store, &key_id, 42, "machine_b", t0() + Duration::days(3))
        .await
        .unwrap();

    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.bound_machine_id.as_deref(), Some("machine_b"));
    // Rebind never touches the expiry clock
    assert_eq!(detail.expires_at, Some(activation.expires_at));

    // The new machine can now activate
    let again = lifecycle_service::activate_key_at(
        &store,
        &key_id,
        "machine_b",
        42,
        t0() + Duration::days(3),
    )
    .await
    .unwrap();
    assert_eq!(again.expires_at, activation.expires_at);
}

#[tokio::test]
async fn rebind_denied_for_non_owner() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    let err = lifecycle_service::rebind_key_at(&store, &key_id, 77, "m2", t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OwnershipMismatch));
}

#[tokio::test]
async fn rebind_denied_before_first_activation() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    // No owner recorded yet, so nobody can rebind
    let err = lifecycle_service::rebind_key_at(&store, &key_id, 42, "m1", t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OwnershipMismatch));
}

#[tokio::test]
async fn expired_key_denied() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 1).await;

    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();

    let late = t0() + Duration::seconds(86401);
    let err = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, late)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExpiredKey));

    let err = lifecycle_service::rebind_key_at(&store, &key_id, 42, "m2", late)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExpiredKey));
}

#[tokio::test]
async fn unknown_key_denied() {
    let (_dir, store) = temp_store().await;
    let err = lifecycle_service::activate_key_at(&store, "no-such-key", "m1", 42, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidKey));
}

#[tokio::test]
async fn revoked_key_denied_but_record_retained() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;
    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();

    assert!(lifecycle_service::revoke_key_at(&store, &key_id, t0())
        .await
        .unwrap());
    // Idempotent
    assert!(lifecycle_service::revoke_key_at(&store, &key_id, t0())
        .await
        .unwrap());
    // Unknown keys report false instead of failing
    assert!(!lifecycle_service::revoke_key_at(&store, "missing", t0())
        .await
        .unwrap());

    let err = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RevokedKey));

    // Revoke is non-destructive: record and usage survive, no tombstone
    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert!(!detail.is_active);
    assert_eq!(detail.usage_count, 1);
    let tombstoned = store
        .read(|s| s.deleted_keys.contains_key(&key_id))
        .await;
    assert!(!tombstoned);
}

#[tokio::test]
async fn deleted_key_is_permanently_inert() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;
    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();

    assert!(
        lifecycle_service::delete_key_at(&store, &key_id, 1111, t0())
            .await
            .unwrap()
    );
    // Second delete reports false
    assert!(
        !lifecycle_service::delete_key_at(&store, &key_id, 1111, t0())
            .await
            .unwrap()
    );

    // The tombstone check runs before everything else
    let err = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DeletedKey));
    let err = lifecycle_service::rebind_key_at(&store, &key_id, 42, "m2", t0())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DeletedKey));

    let tomb = store.read(|s| s.deleted_keys.get(&key_id).cloned()).await;
    let tomb = tomb.expect("tombstone recorded");
    assert_eq!(tomb.deleted_by, 1111);
    assert_eq!(tomb.key.owner_user_id, Some(42));
}

#[tokio::test]
async fn audit_log_records_lifecycle_events() {
    let (_dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;
    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    lifecycle_service::rebind_key_at(&store, &key_id, 42, "m2", t0())
        .await
        .unwrap();
    lifecycle_service::revoke_key_at(&store, &key_id, t0())
        .await
        .unwrap();

    use license_key_service::models::audit::AuditEvent;
    let events = store
        .read(|s| s.key_logs.iter().map(|e| e.event).collect::<Vec<_>>())
        .await;
    assert_eq!(
        events,
        vec![
            AuditEvent::Generate,
            AuditEvent::Activate,
            AuditEvent::Rebind,
            AuditEvent::Revoke
        ]
    );
}
