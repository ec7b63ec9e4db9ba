//! Doccredit Service - HTTP API for document credits and subscriptions.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doccredit_service::{create_router, AppState, ServiceConfig};
use doccredit_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,doccredit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Doccredit Service");

    let config = ServiceConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        stripe_configured = %config.stripe_api_key.is_some(),
        plans = config.catalog.plans.len(),
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    let state = AppState::new(store, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, doccredit_store::StoreError> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(doccredit_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, doccredit_store::StoreError> {
    tracing::warn!("Built without rocksdb-backend - ledger is in memory and lost on restart");
    Ok(Arc::new(doccredit_store::MemoryStore::new()))
}
