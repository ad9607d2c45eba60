//! Common test utilities for quill integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, Utc};

use quill_core::{Account, CreditPolicy, Tier, UserId};
use quill_service::{create_router, AppState, ServiceConfig};
use quill_store::{MemoryStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The backing store, for seeding records directly.
    pub store: Arc<MemoryStore>,
    /// A test user ID for account routes.
    pub test_user_id: UserId,
    /// The service API key.
    pub service_api_key: String,
    /// The admin API key.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(store.clone(), store)
    }

    /// Create a harness whose service runs on `backing` instead.
    ///
    /// `store` is then a detached memory store; seeding it has no effect.
    pub fn with_store(backing: Arc<dyn Store>) -> Self {
        Self::build(backing, Arc::new(MemoryStore::new()))
    }

    fn build(backing: Arc<dyn Store>, store: Arc<MemoryStore>) -> Self {

        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            database_url: None,
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            proxy_timeout_seconds: 5,
            policy: CreditPolicy::default(),
        };

        let state = AppState::new(backing, config).expect("Failed to build app state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            test_user_id: UserId::generate(),
            service_api_key,
            admin_api_key,
        }
    }

    /// Account route prefix for the test user.
    pub fn account_path(&self, suffix: &str) -> String {
        format!("/v1/accounts/{}{}", self.test_user_id, suffix)
    }

    /// Admin route prefix for the test user.
    pub fn admin_path(&self, suffix: &str) -> String {
        format!("/v1/admin/accounts/{}{}", self.test_user_id, suffix)
    }

    /// Create the test user's account through the API.
    pub async fn init_account(&self) {
        self.server
            .post(&self.account_path(""))
            .add_header("x-api-key", self.service_api_key.clone())
            .await
            .assert_status_ok();
    }

    /// Store an account directly, bypassing the API.
    pub fn seed_account(&self, balance: i64, tier: Tier, expires_at: Option<DateTime<Utc>>) {
        let mut account = Account::new(
            self.test_user_id.clone(),
            tier,
            &CreditPolicy::default(),
            Utc::now(),
        );
        account.balance = balance;
        account.tier = tier;
        account.subscription_active = tier != Tier::Free;
        account.subscription_expires_at = expires_at;
        self.store.put_account(account).expect("Failed to seed account");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
