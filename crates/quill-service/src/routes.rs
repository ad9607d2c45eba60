//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, backend, credits, health, query, subscriptions};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for credit endpoints.
const CREDITS_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent admin requests.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Service API key (`x-api-key`)
/// - `POST /v1/accounts/:user_id` - Initialize account
/// - `GET /v1/accounts/:user_id/status` - Status projection
/// - `GET /v1/accounts/:user_id/credits/check` - Balance check
/// - `POST /v1/accounts/:user_id/credits/consume` - Consume one credit
/// - `GET|PUT|DELETE /v1/accounts/:user_id/backend` - Backend selection
/// - `POST /v1/accounts/:user_id/query` - Validate and proxy a query
///
/// ## Admin API key (`x-admin-key`)
/// - `POST /v1/admin/accounts/:user_id/upgrade`
/// - `POST /v1/admin/accounts/:user_id/downgrade`
/// - `POST /v1/admin/accounts/:user_id/renew`
/// - `POST /v1/admin/accounts/:user_id/bonus`
/// - `POST /v1/admin/accounts/:user_id/expiry-check`
/// - `POST /v1/admin/accounts/:user_id/monthly-reset`
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Check/consume sit on every gated action, so they get the higher limit.
    let credit_routes = Router::new()
        .route("/check", get(credits::check_balance))
        .route("/consume", post(credits::consume))
        .layer(ConcurrencyLimitLayer::new(CREDITS_MAX_CONCURRENT_REQUESTS));

    let account_routes = Router::new()
        .route("/", post(accounts::initialize_account))
        .route("/status", get(accounts::get_status))
        .route(
            "/backend",
            get(backend::get_selection)
                .put(backend::put_selection)
                .delete(backend::clear_selection),
        )
        .route("/query", post(query::run_query))
        .nest("/credits", credit_routes);

    let admin_routes = Router::new()
        .route("/upgrade", post(subscriptions::upgrade))
        .route("/downgrade", post(subscriptions::downgrade))
        .route("/renew", post(subscriptions::renew))
        .route("/bonus", post(subscriptions::grant_bonus))
        .route("/expiry-check", post(subscriptions::check_expiry))
        .route("/monthly-reset", post(subscriptions::reset_monthly))
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .nest("/accounts/:user_id", account_routes)
        .nest("/admin/accounts/:user_id", admin_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
