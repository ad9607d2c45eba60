//! Quill Service - HTTP API for the credit ledger and query proxy.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill_service::{create_router, AppState, ServiceConfig};
use quill_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,quill=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quill Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        free_credits = config.policy.free_tier_credits,
        pro_credits = config.policy.pro_tier_credits,
        units_per_credit = config.policy.units_per_credit,
        "Service configuration loaded"
    );

    let store: Arc<dyn Store> = if let Some(url) = config.database_url.as_deref() {
        tracing::info!("Connecting to PostgreSQL");
        let store = PgStore::connect(url).await?;
        store.migrate().await?;
        Arc::new(store)
    } else {
        tracing::warn!("DATABASE_URL not configured - using in-memory store, data is not persisted");
        Arc::new(MemoryStore::new())
    };

    let state = AppState::new(store, config.clone())?;
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
