//! Settlement atomicity and isolation tests.

mod common;

use gateway_service::services::store::{MemoryStore, PgStore, SettlementInput, Store};
use rust_decimal::Decimal;
use serial_test::serial;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

fn settlement(account_id: &str, cost: Decimal) -> SettlementInput {
    SettlementInput {
        account_id: account_id.to_string(),
        provider: "mock".to_string(),
        model_id: "test-model".to_string(),
        tokens_used: 8,
        cost,
        response_content: "Mock streaming response".to_string(),
    }
}

async fn run_concurrent_settlements(store: Arc<dyn Store>, account_id: &str) {
    let start = Decimal::new(100, 0);
    store
        .get_or_create_account(account_id, start)
        .await
        .expect("Failed to create account");

    // Costs 0.01 .. 0.10, settled concurrently.
    let costs: Vec<Decimal> = (1..=10).map(|i| Decimal::new(i, 2)).collect();

    let mut handles = Vec::new();
    for cost in costs.iter().copied() {
        let store = store.clone();
        let account_id = account_id.to_string();
        handles.push(tokio::spawn(async move {
            store
                .settle(&settlement(&account_id, cost))
                .await
                .expect("Settlement failed");
        }));
    }
    for handle in handles {
        handle.await.expect("Settlement task panicked");
    }

    // Whatever order they ran in, the arithmetic is sequential.
    let total: Decimal = costs.iter().copied().sum();
    let account = store
        .get_account(account_id)
        .await
        .unwrap()
        .expect("Account should exist");
    assert_eq!(account.balance, start - total);

    let usage = store.list_usage(account_id).await.unwrap();
    assert_eq!(usage.len(), 10);
}

#[tokio::test]
async fn concurrent_settlements_apply_sequential_balance_arithmetic() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    run_concurrent_settlements(store, "shared-account").await;
}

#[tokio::test]
async fn settlement_writes_balance_usage_and_message_together() {
    common::init_tracing();
    let store = MemoryStore::new();
    store
        .get_or_create_account("acct", Decimal::new(10, 0))
        .await
        .unwrap();

    let usage = store
        .settle(&settlement("acct", Decimal::new(5, 2)))
        .await
        .unwrap();

    let account = store.get_account("acct").await.unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(10, 0) - Decimal::new(5, 2));

    let message = store
        .find_message(usage.message_id)
        .await
        .expect("settlement message should exist");
    assert_eq!(message.content, "Mock streaming response");
    assert_eq!(message.sender_type, "agent");
    assert_eq!(message.token_usage, 8);
}

#[tokio::test]
async fn settling_an_unknown_account_fails_without_side_effects() {
    common::init_tracing();
    let store = MemoryStore::new();

    let err = store
        .settle(&settlement("ghost", Decimal::new(5, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(store.list_usage("ghost").await.unwrap().is_empty());
    assert_eq!(store.message_count().await, 0);
}

#[tokio::test]
async fn repeated_account_references_keep_the_original_balance() {
    common::init_tracing();
    let store = MemoryStore::new();

    let first = store
        .get_or_create_account("acct", Decimal::new(10, 0))
        .await
        .unwrap();
    store
        .settle(&settlement("acct", Decimal::new(5, 2)))
        .await
        .unwrap();

    // A later reference must not reset the balance.
    let second = store
        .get_or_create_account("acct", Decimal::new(10, 0))
        .await
        .unwrap();
    assert_eq!(second.balance, first.balance - Decimal::new(5, 2));
}

/// Requires a running PostgreSQL; run with:
/// `TEST_DATABASE_URL=postgres://... cargo test -p gateway-service -- --ignored`
#[tokio::test]
#[ignore]
#[serial]
async fn concurrent_settlements_serialize_on_postgres() {
    common::init_tracing();

    let database_url =
        std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for this test");

    let store = PgStore::connect(&database_url, 5, 1)
        .await
        .expect("Failed to connect to PostgreSQL");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");

    let account_id = format!("acct-{}", Uuid::new_v4());
    run_concurrent_settlements(Arc::new(store), &account_id).await;
}
