//! Contract tests - every driver property, exercised on the simulation
//!
//! The same assertions hold for the production drivers; the simulation lets
//! them run deterministically, with injected faults, and without a database.

use std::time::Duration;

use anyhow::Result;
use omnistore::dst::{FaultConfig, FaultInjector, FaultType};
use omnistore::{
    to_record, Conditions, ListOptions, Record, ServiceFactory, Settings, SimDriver, SortSpec,
    StorageDriver, StoreError, TransactionAction,
};
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rec(value: Value) -> Record {
    to_record(value).expect("test records are objects")
}

/// Drivers are used through the trait object, as the factory hands them out.
async fn seeded(table: &str) -> Result<Box<dyn StorageDriver>> {
    init_tracing();
    let driver: Box<dyn StorageDriver> = Box::new(SimDriver::new(table));
    driver
        .bulk_insert(&[
            rec(json!({"name": "alice", "city": "Oslo", "balance": 100})),
            rec(json!({"name": "bob", "city": "Lima", "balance": 20})),
            rec(json!({"name": "carol", "city": "Oslo", "balance": 55})),
            rec(json!({"name": "dave", "city": "Kyiv", "balance": 0})),
        ])
        .await?;
    Ok(driver)
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_get_after_create_returns_superset() -> Result<()> {
    let driver = seeded("people").await?;
    let record = rec(json!({"name": "erin", "city": "Rome", "tags": ["a", "b"]}));

    let id = driver.create(&record).await?;
    let got = driver
        .get(&Conditions::new().eq("id", id.to_value()))
        .await?
        .expect("created record is readable");

    for (field, value) in &record {
        assert_eq!(got.get(field), Some(value), "field {field}");
    }
    Ok(())
}

#[tokio::test]
async fn test_count_matches_listing_and_exists() -> Result<()> {
    let driver = seeded("people").await?;
    let everything = ListOptions::new().with_limit(u64::MAX);

    let filters = [
        Conditions::new(),
        Conditions::new().eq("city", "Oslo"),
        Conditions::new().eq("city", "Oslo").eq("name", "carol"),
        Conditions::new().eq("city", "Paris"),
    ];
    for conditions in &filters {
        let count = driver.count(conditions).await?;
        let listed = driver.get_all(conditions, &everything).await?;
        assert_eq!(count, listed.len() as u64);
        assert_eq!(driver.exists(conditions).await?, count > 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_update_is_idempotent() -> Result<()> {
    let driver = seeded("people").await?;
    let data = rec(json!({"city": "Bergen"}));
    let alice = Conditions::new().eq("name", "alice");

    assert!(driver.update(&data, &alice).await?);
    let first = driver.get(&alice).await?;
    assert!(!driver.update(&data, &alice).await?);
    let second = driver.get(&alice).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_increment_inverse_restores_value() -> Result<()> {
    let driver = seeded("people").await?;
    let bob = Conditions::new().eq("name", "bob");
    let before = driver.get(&bob).await?.expect("bob exists");

    assert!(driver.increment("balance", 37.into(), &bob).await?);
    assert!(driver.increment("balance", (-37).into(), &bob).await?);

    let after = driver.get(&bob).await?.expect("bob exists");
    assert_eq!(before["balance"], after["balance"]);
    Ok(())
}

#[tokio::test]
async fn test_increment_missing_field_starts_at_zero() -> Result<()> {
    let driver = seeded("people").await?;
    let dave = Conditions::new().eq("name", "dave");

    assert!(driver.increment("visits", 1.into(), &dave).await?);
    let got = driver.get(&dave).await?.expect("dave exists");
    assert_eq!(got["visits"], json!(1));
    Ok(())
}

#[tokio::test]
async fn test_unknown_action_leaves_store_unchanged() -> Result<()> {
    let driver = seeded("people").await?;
    let before = driver.count(&Conditions::new()).await?;

    let actions = vec![
        json!({"method": "create", "data": {"name": "zed"}}),
        json!({"method": "upsert", "data": {"name": "zed"}, "condition": {"name": "zed"}}),
    ];
    let result = driver.transaction_json(&actions).await;

    assert!(matches!(result, Err(StoreError::InvalidAction(_))));
    assert_eq!(driver.count(&Conditions::new()).await?, before);
    assert!(!driver.exists(&Conditions::new().eq("name", "zed")).await?);
    Ok(())
}

#[tokio::test]
async fn test_failed_action_rolls_back_earlier_actions() -> Result<()> {
    let driver = seeded("people").await?;

    let actions = vec![
        TransactionAction::increment("balance", -30, Conditions::new().eq("name", "alice")),
        TransactionAction::increment("city", 1, Conditions::new().eq("name", "bob")),
    ];
    let result = driver.transaction(&actions).await;

    assert!(matches!(result, Err(StoreError::Validation(_))));
    let alice = driver.get(&Conditions::new().eq("name", "alice")).await?;
    assert_eq!(alice.expect("alice exists")["balance"], json!(100));
    Ok(())
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_account_lifecycle() -> Result<()> {
    init_tracing();
    let driver = SimDriver::new("accounts");

    let id = driver
        .create(&rec(json!({"name": "A", "balance": 100})))
        .await?;
    let by_id = Conditions::new().eq("id", id.to_value());

    let got = driver.get(&by_id).await?.expect("account exists");
    assert_eq!(got["name"], json!("A"));
    assert_eq!(got["balance"], json!(100));

    assert!(driver.increment("balance", 50.into(), &by_id).await?);
    let got = driver.get(&by_id).await?.expect("account exists");
    assert_eq!(got["balance"], json!(150));

    assert!(driver.delete(&by_id).await?);
    assert!(driver.get(&by_id).await?.is_none());
    assert!(!driver.delete(&by_id).await?);
    Ok(())
}

#[tokio::test]
async fn test_create_then_delete_in_one_transaction() -> Result<()> {
    init_tracing();
    let driver = SimDriver::new("inventory");

    let actions = vec![
        json!({"method": "create", "data": {"sku": "X1", "qty": 3}}),
        json!({"method": "increment", "data": {"qty": 2}, "condition": {"sku": "X1"}}),
        json!({"method": "delete", "condition": {"sku": "X1"}}),
    ];
    assert!(driver.transaction_json(&actions).await?);
    assert!(!driver.exists(&Conditions::new().eq("sku", "X1")).await?);
    Ok(())
}

#[tokio::test]
async fn test_transfer_between_accounts() -> Result<()> {
    let driver = seeded("people").await?;

    let actions = vec![
        json!({"method": "increment", "field": "balance", "amount": -40, "condition": {"name": "alice"}}),
        json!({"method": "increment", "data": {"balance": 40}, "condition": {"name": "bob"}}),
        json!({"method": "update", "data": {"lastTransfer": "alice->bob"}, "condition": {"name": "bob"}}),
    ];
    assert!(driver.transaction_json(&actions).await?);

    let alice = driver.get(&Conditions::new().eq("name", "alice")).await?.expect("alice");
    let bob = driver.get(&Conditions::new().eq("name", "bob")).await?.expect("bob");
    assert_eq!(alice["balance"], json!(60));
    assert_eq!(bob["balance"], json!(60));
    assert_eq!(bob["lastTransfer"], json!("alice->bob"));
    Ok(())
}

#[tokio::test]
async fn test_soft_delete_flags_records() -> Result<()> {
    let driver = seeded("people").await?;
    let oslo = Conditions::new().eq("city", "Oslo");

    assert!(driver.soft_delete(&oslo, None).await?);
    assert_eq!(driver.count(&Conditions::new().eq("isDeleted", true)).await?, 2);

    assert!(driver.soft_delete(&oslo, Some("archived")).await?);
    assert!(driver.exists(&Conditions::new().eq("archived", true)).await?);

    // Already flagged: nothing changes
    assert!(!driver.soft_delete(&oslo, None).await?);
    Ok(())
}

#[tokio::test]
async fn test_listing_sorts_and_pages() -> Result<()> {
    let driver = seeded("people").await?;

    let options = ListOptions::new()
        .with_sort(SortSpec::new().asc("city").desc("balance"))
        .with_limit(3);
    let page = driver.get_all(&Conditions::new(), &options).await?;
    let names: Vec<&Value> = page.iter().map(|r| &r["name"]).collect();
    assert_eq!(names, [&json!("dave"), &json!("bob"), &json!("alice")]);

    let default_page = driver.get_all(&Conditions::new(), &ListOptions::default()).await?;
    assert_eq!(default_page.len(), 4);

    let beyond = ListOptions::new().with_offset(10);
    assert!(driver.get_all(&Conditions::new(), &beyond).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_search_any_field_ignoring_case() -> Result<()> {
    let driver = seeded("people").await?;

    let found = driver.search("OS", &["name", "city"]).await?;
    assert_eq!(found.len(), 2);

    let found = driver.search("li", &["city"]).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], json!("bob"));

    assert!(matches!(
        driver.search("x", &[]).await,
        Err(StoreError::Validation(_))
    ));
    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validation_errors_surface_immediately() -> Result<()> {
    let driver = seeded("people").await?;
    let empty = Conditions::new();

    assert!(matches!(driver.create(&Record::new()).await, Err(StoreError::Validation(_))));
    assert!(matches!(driver.get(&empty).await, Err(StoreError::Validation(_))));
    assert!(matches!(driver.delete(&empty).await, Err(StoreError::Validation(_))));
    assert!(matches!(
        driver.update(&Record::new(), &Conditions::new().eq("name", "bob")).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        driver.increment("", 1.into(), &Conditions::new().eq("name", "bob")).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(driver.transaction(&[]).await, Err(StoreError::Validation(_))));

    let mismatched = [rec(json!({"a": 1, "b": 2})), rec(json!({"a": 1, "c": 2}))];
    assert!(matches!(
        driver.bulk_insert(&mismatched).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(driver.bulk_insert(&[]).await, Err(StoreError::Validation(_))));

    // Same fields in a different order are fine
    let reordered = [rec(json!({"a": 1, "b": 2})), rec(json!({"b": 3, "a": 4}))];
    assert_eq!(driver.bulk_insert(&reordered).await?, 2);
    Ok(())
}

// =============================================================================
// Faults and Retry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_backs_off_linearly() -> Result<()> {
    init_tracing();
    let faults = FaultInjector::new(42).with_fault(FaultConfig::times(FaultType::TransientWrite, 2));
    let driver = SimDriver::new("accounts").with_faults(faults);

    let started = tokio::time::Instant::now();
    driver.create(&rec(json!({"name": "A"}))).await?;

    // 1s after the first failure, 2s after the second
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(driver.faults_triggered(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_faults_are_not_retried() -> Result<()> {
    init_tracing();
    let faults = FaultInjector::new(42).with_fault(FaultConfig::times(FaultType::BackendFailure, 1));
    let driver = SimDriver::new("accounts").with_faults(faults);

    let result = driver.create(&rec(json!({"name": "A"}))).await;
    assert!(matches!(result, Err(StoreError::Backend { .. })));
    assert_eq!(driver.faults_triggered(), 1);
    assert_eq!(driver.count(&Conditions::new()).await?, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transaction_actions_are_not_retried() -> Result<()> {
    init_tracing();
    let faults = FaultInjector::new(42).with_fault(FaultConfig::times(FaultType::TransientWrite, 1));
    let driver = SimDriver::new("accounts").with_faults(faults);

    let actions = vec![TransactionAction::Create {
        data: rec(json!({"name": "A"})),
    }];
    let result = driver.transaction(&actions).await;

    assert!(matches!(result, Err(StoreError::TransientBackend { .. })));
    assert_eq!(driver.count(&Conditions::new()).await?, 0);

    // The caller may retry the whole unit
    assert!(driver.transaction(&actions).await?);
    Ok(())
}

#[tokio::test]
async fn test_seeded_faults_never_leave_partial_transactions() -> Result<()> {
    init_tracing();
    let faults = FaultInjector::new(7)
        .with_fault(FaultConfig::new(FaultType::TransientWrite, 0.3))
        .with_fault(FaultConfig::new(FaultType::CommitFailure, 0.3));
    let driver = SimDriver::new("ledger").with_faults(faults);

    let mut committed = 0_u64;
    for i in 0..50 {
        let actions = vec![
            TransactionAction::Create {
                data: rec(json!({"entry": i, "side": "debit"})),
            },
            TransactionAction::Create {
                data: rec(json!({"entry": i, "side": "credit"})),
            },
        ];
        if driver.transaction(&actions).await.is_ok() {
            committed += 1;
        }
    }

    // Only write and commit faults are declared, so reads succeed
    let everything = ListOptions::new().with_limit(u64::MAX);
    let rows = driver.get_all(&Conditions::new(), &everything).await?;
    assert_eq!(rows.len() as u64, committed * 2);
    for i in 0..50 {
        let legs = driver.count(&Conditions::new().eq("entry", i)).await?;
        assert!(legs == 0 || legs == 2, "entry {i} has {legs} legs");
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_increments_are_atomic() -> Result<()> {
    init_tracing();
    let driver = SimDriver::new("counters");
    driver.create(&rec(json!({"name": "hits", "value": 0}))).await?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let driver = driver.clone();
        handles.push(tokio::spawn(async move {
            let hits = Conditions::new().eq("name", "hits");
            for _ in 0..10 {
                driver.increment("value", 1.into(), &hits).await?;
            }
            Ok::<_, StoreError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let hits = driver.get(&Conditions::new().eq("name", "hits")).await?.expect("counter");
    assert_eq!(hits["value"], json!(160));
    Ok(())
}

// =============================================================================
// Factory
// =============================================================================

#[tokio::test]
async fn test_factory_rejects_unknown_backend() {
    init_tracing();
    let factory = ServiceFactory::new(Settings::default());

    let result = factory.get_instance("postgres", "t").await;
    assert!(matches!(result, Err(StoreError::Configuration(_))));
}
