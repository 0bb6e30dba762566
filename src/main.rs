//! AssetOps Offline Sync Agent
//!
//! Keeps the operations console usable without a connection: failed mutations
//! land in a durable queue and replay when connectivity returns, while a
//! cache worker serves static assets and previously fetched API reads.

mod auth;
mod config;
mod errors;
mod gateway;
mod intercept;
mod models;
mod monitor;
mod notify;
mod store;
mod sync;
mod worker;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::SessionTokens;
use config::Config;
use gateway::GatewayState;
use intercept::RequestInterceptor;
use monitor::ConnectivityMonitor;
use notify::{LogNotifier, Notifier};
use store::PendingActionStore;
use sync::SyncEngine;
use worker::{CacheStore, CacheWorker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AssetOps offline sync agent");
    tracing::info!("Backend: {}", config.backend_url);
    tracing::info!("Queue path: {:?}", config.queue_path);
    tracing::info!("Cache db path: {:?}", config.cache_db_path);

    if config.auth_token.is_none() {
        tracing::warn!("No auth token configured (SYNC_AUTH_TOKEN). Requests go out unauthenticated");
    }

    // Shared collaborators, passed explicitly rather than looked up globally
    let client = reqwest::Client::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let tokens = Arc::new(SessionTokens::new(config.auth_token.clone()));
    let monitor = Arc::new(ConnectivityMonitor::new(true, notifier.clone()));

    // Pending action store, loaded once from the prior session
    let store = Arc::new(PendingActionStore::open(&config.queue_path));
    if !store.is_empty() {
        tracing::info!("{} pending actions carried over from prior session", store.len());
    }

    // Cache worker: install, then take control immediately
    let pool = worker::init_cache_db(&config.cache_db_path).await?;
    let cache_worker = CacheWorker::new(
        CacheStore::new(pool),
        client.clone(),
        &config.backend_url,
        config.cache_version,
    );
    cache_worker.install().await?;
    cache_worker.activate().await?;

    let worker_handle = worker::spawn_control_loop(cache_worker.clone());
    let worker_router = cache_worker.router(worker_handle);

    let worker_listener = tokio::net::TcpListener::bind(&config.worker_addr).await?;
    tracing::info!("Cache worker listening on {}", config.worker_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(worker_listener, worker_router).await {
            tracing::error!("Cache worker server failed: {}", e);
        }
    });

    // Sync engine: startup pass, reconnect passes, and the recurring interval
    let engine = Arc::new(SyncEngine::new(
        client.clone(),
        &config.backend_url,
        store.clone(),
        monitor.clone(),
        tokens.clone(),
        notifier,
    ));
    tokio::spawn(engine.run(config.sync_interval));

    // Connectivity events: SIGUSR1 = offline, SIGUSR2 = online
    #[cfg(unix)]
    spawn_signal_handlers(monitor.clone())?;

    // Request gateway for the console UI
    let interceptor = Arc::new(RequestInterceptor::new(
        client,
        &config.backend_url,
        Some(format!("http://{}", config.worker_addr)),
        store.clone(),
        monitor.clone(),
        tokens.clone(),
    ));

    let app = gateway::create_router(GatewayState {
        interceptor,
        monitor,
        store,
        tokens,
    });

    let listener = tokio::net::TcpListener::bind(&config.gateway_addr).await?;
    tracing::info!("Gateway listening on {}", config.gateway_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire OS signals as the connectivity event source for the agent process.
#[cfg(unix)]
fn spawn_signal_handlers(
    monitor: Arc<ConnectivityMonitor>,
) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut offline_events = signal(SignalKind::user_defined1())?;
    let mut online_events = signal(SignalKind::user_defined2())?;

    let offline_monitor = monitor.clone();
    tokio::spawn(async move {
        while offline_events.recv().await.is_some() {
            offline_monitor.set_offline();
        }
    });
    tokio::spawn(async move {
        while online_events.recv().await.is_some() {
            monitor.set_online();
        }
    });

    Ok(())
}
