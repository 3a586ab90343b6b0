//! Record store persistence: atomic table files, reopen, snapshot
//! recovery.

mod common;

use common::{generate_at_t0, t0, temp_store};
use license_key_service::error::AppError;
use license_key_service::services::{entitlement_service, lifecycle_service};
use license_key_service::store::{KeyStore, MAX_SNAPSHOTS};

#[tokio::test]
async fn tables_survive_reopen() {
    let (dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;
    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    drop(store);

    let reopened = KeyStore::open(dir.path()).await.unwrap();
    let detail = entitlement_service::key_detail(&reopened, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.owner_user_id, Some(42));
    assert_eq!(detail.usage_count, 1);

    let log_len = reopened.read(|s| s.key_logs.len()).await;
    assert_eq!(log_len, 2);
}

#[tokio::test]
async fn canonical_files_written_without_leftover_temps() {
    let (dir, store) = temp_store().await;
    generate_at_t0(&store, 1, 30).await;

    for table in ["keys.json", "key_usage.json", "deleted_keys.json", "key_logs.json"] {
        assert!(dir.path().join(table).exists(), "{table} missing");
        assert!(
            !dir.path().join(format!("{table}.tmp")).exists(),
            "{table}.tmp left behind"
        );
    }
}

#[tokio::test]
async fn snapshot_captured_per_mutation_and_recoverable() {
    let (dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;
    lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0())
        .await
        .unwrap();
    drop(store);

    let snapshots: Vec<_> = std::fs::read_dir(dir.path().join("snapshots"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(snapshots.len() >= 2);
    assert!(
        snapshots
            .iter()
            .all(|name| name.starts_with("snapshot-") && name.ends_with(".json"))
    );

    // Losing every canonical table still recovers from the newest snapshot
    for table in ["keys.json", "key_usage.json", "deleted_keys.json", "key_logs.json"] {
        std::fs::remove_file(dir.path().join(table)).unwrap();
    }
    let recovered = KeyStore::open(dir.path()).await.unwrap();
    let detail = entitlement_service::key_detail(&recovered, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.owner_user_id, Some(42));
}

#[tokio::test]
async fn failed_persist_leaves_memory_unchanged() {
    let (dir, store) = temp_store().await;
    let key_id = generate_at_t0(&store, 1, 30).await;

    // Renaming a file over a non-empty directory fails, so the usage
    // table can no longer be persisted.
    let usage_path = dir.path().join("key_usage.json");
    std::fs::remove_file(&usage_path).unwrap();
    std::fs::create_dir(&usage_path).unwrap();
    std::fs::write(usage_path.join("occupant"), b"x").unwrap();

    let result = lifecycle_service::activate_key_at(&store, &key_id, "m1", 42, t0()).await;
    assert!(matches!(result, Err(AppError::StoreIo(_))));

    // The denied activation must not survive in memory
    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert!(detail.owner_user_id.is_none());
    assert!(detail.bound_machine_id.is_none());
    assert!(detail.expires_at.is_none());
    assert_eq!(detail.usage_count, 0);

    // And once persistence works again the key is still claimable
    std::fs::remove_file(usage_path.join("occupant")).unwrap();
    std::fs::remove_dir(&usage_path).unwrap();
    let activation = lifecycle_service::activate_key_at(&store, &key_id, "m2", 42, t0())
        .await
        .unwrap();
    assert!(activation.first_activation);
}

#[tokio::test]
async fn snapshots_pruned_to_retention_cap() {
    let (dir, store) = temp_store().await;
    let mut last_key = String::new();
    for _ in 0..(MAX_SNAPSHOTS + 5) {
        last_key = generate_at_t0(&store, 1, 30).await;
    }
    drop(store);

    let snapshots = std::fs::read_dir(dir.path().join("snapshots"))
        .unwrap()
        .count();
    assert_eq!(snapshots, MAX_SNAPSHOTS);

    // The retained newest snapshot still carries the latest state
    for table in ["keys.json", "key_usage.json", "deleted_keys.json", "key_logs.json"] {
        std::fs::remove_file(dir.path().join(table)).unwrap();
    }
    let recovered = KeyStore::open(dir.path()).await.unwrap();
    assert!(
        entitlement_service::key_detail(&recovered, &last_key)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn concurrent_activations_cannot_both_claim_a_key() {
    let (_dir, store) = temp_store().await;
    let store = std::sync::Arc::new(store);
    let key_id = generate_at_t0(&store, 1, 30).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let key_id = key_id.clone();
        handles.push(tokio::spawn(async move {
            lifecycle_service::activate_key(&store, &key_id, &format!("machine_{i}"), 42).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    // Exactly one machine wins the binding; everyone else conflicts
    assert_eq!(winners, 1);

    let detail = entitlement_service::key_detail(&store, &key_id)
        .await
        .unwrap();
    assert_eq!(detail.usage_count, 1);
}
