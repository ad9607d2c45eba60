//! PostgreSQL store integration tests.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: DATABASE_URL=postgres://... cargo test --package quill-store --test postgres
//!
//! Without `DATABASE_URL` every test returns early.

use std::sync::Arc;

use chrono::{Duration, Utc};
use quill_core::{
    Account, BackendSelection, CreditPolicy, PlanAssignment, PrivilegedKey, Tier, UserId,
};
use quill_store::{PgStore, Store, StoreError};

/// Connect and migrate, or skip when no database is configured.
async fn load_store() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        println!("DATABASE_URL not set - skipping PostgreSQL tests");
        return None;
    };

    let store = PgStore::connect(&url).await.expect("connect to PostgreSQL");
    store.migrate().await.expect("apply migrations");
    Some(store)
}

async fn seeded(store: &PgStore, balance: i64) -> UserId {
    let user_id = UserId::generate();
    let mut account = Account::new(
        user_id.clone(),
        Tier::Free,
        &CreditPolicy::default(),
        Utc::now(),
    );
    account.balance = balance;
    store
        .insert_account_if_absent(&account)
        .await
        .expect("insert account");
    user_id
}

#[tokio::test]
async fn insert_if_absent_is_idempotent() {
    let Some(store) = load_store().await else {
        return;
    };
    let user_id = seeded(&store, 7).await;

    let again = Account::new(
        user_id.clone(),
        Tier::Pro,
        &CreditPolicy::default(),
        Utc::now(),
    );
    let stored = store.insert_account_if_absent(&again).await.unwrap();
    assert_eq!(stored.balance, 7);
    assert_eq!(stored.tier, Tier::Free);
}

#[tokio::test]
async fn last_credit_is_spent_once() {
    let Some(store) = load_store().await else {
        return;
    };
    let store = Arc::new(store);
    let user_id = seeded(&store, 1).await;

    let a = {
        let store = Arc::clone(&store);
        let user_id = user_id.clone();
        tokio::spawn(async move { store.try_consume(&user_id, 2000).await })
    };
    let b = {
        let store = Arc::clone(&store);
        let user_id = user_id.clone();
        tokio::spawn(async move { store.try_consume(&user_id, 2000).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::InsufficientCredits { balance: 0 })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(rejected, 1);

    let account = store.get_account(&user_id).await.unwrap().unwrap();
    assert_eq!(account.balance, 0);
    assert_eq!(account.lifetime_consumed_units, 2000);
}

#[tokio::test]
async fn expiry_downgrades_once() {
    let Some(store) = load_store().await else {
        return;
    };
    let policy = CreditPolicy::default();
    let user_id = seeded(&store, 3).await;
    let now = Utc::now();

    store
        .assign_plan(&user_id, &PlanAssignment::pro(&policy, now - Duration::days(1)))
        .await
        .unwrap();

    let free = PlanAssignment::free(&policy);
    let expired = store.expire_if_due(&user_id, now, &free).await.unwrap();
    assert_eq!(expired.map(|a| a.balance), Some(policy.free_tier_credits));
    assert!(store
        .expire_if_due(&user_id, now, &free)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn add_credits_refuses_overflow() {
    let Some(store) = load_store().await else {
        return;
    };
    let user_id = seeded(&store, i64::MAX - 1).await;

    let result = store.add_credits(&user_id, 2).await;
    assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
    assert_eq!(
        store.add_credits(&user_id, 1).await.unwrap().balance,
        i64::MAX
    );
}

#[tokio::test]
async fn extend_subscription_only_for_active_pro() {
    let Some(store) = load_store().await else {
        return;
    };
    let user_id = seeded(&store, 3).await;
    let expires_at = Utc::now() + Duration::days(30);

    let result = store.extend_subscription(&user_id, expires_at).await;
    assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));

    let missing = store
        .extend_subscription(&UserId::generate(), expires_at)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));

    store
        .assign_plan(
            &user_id,
            &PlanAssignment::pro(&CreditPolicy::default(), Utc::now()),
        )
        .await
        .unwrap();
    let account = store.extend_subscription(&user_id, expires_at).await.unwrap();
    assert!(account.subscription_expires_at.is_some());
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let Some(store) = load_store().await else {
        return;
    };
    let result = store.add_credits(&UserId::generate(), 5).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn selection_upsert_and_clear() {
    let Some(store) = load_store().await else {
        return;
    };
    let user_id = UserId::generate();
    let first = BackendSelection::new(
        "proj-a",
        "https://proj-a.example.co",
        "anon-a",
        PrivilegedKey::new("secret-a"),
    )
    .unwrap();
    let second = BackendSelection::new(
        "proj-b",
        "https://proj-b.example.co",
        "anon-b",
        PrivilegedKey::new("secret-b"),
    )
    .unwrap();

    store.put_selection(&user_id, &first).await.unwrap();
    store.put_selection(&user_id, &second).await.unwrap();
    assert_eq!(store.get_selection(&user_id).await.unwrap(), Some(second));

    assert!(store.clear_selection(&user_id).await.unwrap());
    assert!(store.get_selection(&user_id).await.unwrap().is_none());
}
