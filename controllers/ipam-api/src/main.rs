//! IPAM API
//!
//! Serves the IPAM engine over HTTP, backed by an in-memory store or NetBox.

use ipam_api::{create_router, AppState, ServiceConfig, ServiceError, StoreConfig};
use ipam_core::{MemoryStore, PoolStore};
use netbox_store::NetBoxStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting IPAM API");

    let config = ServiceConfig::from_env()?;

    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Prefix lengths: /{} to /{}",
        config.ipam.min_prefix_len, config.ipam.max_prefix_len
    );

    let store: Arc<dyn PoolStore> = match &config.store {
        StoreConfig::Memory => {
            info!("  Store: in-memory (not persisted)");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::NetBox { url, token } => {
            info!("  Store: NetBox at {}", url);
            let store = NetBoxStore::new(url, token)?;
            store.validate_token(&CancellationToken::new()).await?;
            Arc::new(store)
        }
    };

    let app = create_router(AppState::new(store, config.ipam));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
