//! Tovar Taxi offline proxy
//!
//! Sits between the browser and the Tovar Taxi web app, serving cached
//! assets and pages when the app is unreachable, queueing shipment
//! submissions for later replay and streaming notification updates to
//! open pages.

mod config;
mod error;
mod proxy;
mod server;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use offline_cache::{spawn_notification_poller, Fetcher, HttpFetcher, OfflineCacheManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("tovar_offline_proxy=info".parse()?)
        .add_directive("offline_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Tovar Taxi offline proxy...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Upstream: {}", config.upstream_url);
    info!("Install mode: {}", config.install_mode);
    info!(
        "Notification poll interval: {} seconds",
        config.notification_poll_secs
    );

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_timeout(Duration::from_secs(
        config.upstream_timeout_secs,
    ))?);
    let manager = Arc::new(OfflineCacheManager::new(
        config.cache_config(),
        fetcher.clone(),
    )?);

    if config.auto_install {
        let installed = manager.install().await?;
        info!(
            cached = installed.cached.len(),
            failed = installed.failed.len(),
            "Static cache populated"
        );
        let activated = manager.activate().await?;
        info!(deleted = ?activated.deleted, "Offline cache active");
    }

    let _poller = spawn_notification_poller(
        manager.clone(),
        Duration::from_secs(config.notification_poll_secs),
    );

    let state: SharedState = Arc::new(ServerState::new(
        manager,
        fetcher,
        config.upstream_url.clone(),
        config.cors_origins.clone(),
    ));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
