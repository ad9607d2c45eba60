//! Application state.

use std::sync::Arc;
use std::time::Duration;

use quill_ledger::{CreditService, SubscriptionService};
use quill_proxy::{ExecutionError, ExecutorOptions, QueryExecutor};
use quill_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Credit accounting.
    pub credits: CreditService,

    /// Subscription lifecycle.
    pub subscriptions: SubscriptionService,

    /// Query proxy executor.
    pub executor: QueryExecutor,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy HTTP client cannot be built.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, ExecutionError> {
        let credits = CreditService::new(Arc::clone(&store), config.policy.clone());
        let subscriptions = SubscriptionService::new(Arc::clone(&store), config.policy.clone());
        let executor = QueryExecutor::with_options(ExecutorOptions {
            timeout: Duration::from_secs(config.proxy_timeout_seconds),
            ..ExecutorOptions::default()
        })?;

        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not configured - /v1 routes will reject all requests");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin routes will reject all requests");
        }

        Ok(Self {
            store,
            config,
            credits,
            subscriptions,
            executor,
        })
    }
}
