//! Server entry point: wire configuration, storage, outbound clients and
//! the HTTP API together, then run until stopped.

mod auth;
mod config;
mod error;
mod object_store;
mod preview;
mod routes;
mod throttle;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clique_store::Database;

use crate::config::ServerConfig;
use crate::object_store::ObjectStore;
use crate::preview::PreviewClient;
use crate::routes::AppState;
use crate::throttle::CredentialThrottle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,clique_server=debug")),
        )
        .init();

    // 2. Configuration
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        object_store = %config.object_store_url,
        preview = %config.preview_service_url,
        "starting clique server"
    );

    // 3. Storage
    let database = Database::open_at(&config.database_path)?;

    // 4. Token signing identity
    let identity = config.service_identity();
    info!(
        verifying_key = %hex::encode(identity.verifying_key().as_bytes()),
        "token identity ready"
    );

    // 5. Outbound service clients and shared state
    let object_store = ObjectStore::new(&config.object_store_url, &config.object_store_bucket)?;
    let preview = PreviewClient::new(&config.preview_service_url)?;
    let throttle = CredentialThrottle::new(
        config.credential_attempts_per_minute,
        Duration::from_secs(60),
    );

    let addr = config.http_addr;
    let state = AppState {
        db: Arc::new(Mutex::new(database)),
        identity: Arc::new(identity),
        object_store: Arc::new(object_store),
        preview: Arc::new(preview),
        throttle: throttle.clone(),
        config: Arc::new(config),
    };

    // 6. Background maintenance
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            throttle.purge_stale().await;
        }
    });

    // 7. Serve until failure or Ctrl+C
    tokio::select! {
        result = routes::serve(state, addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
