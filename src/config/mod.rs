//! Configuration module for the sync agent.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin that queued actions are replayed against
    pub backend_url: String,
    /// Path to the persisted pending-action queue (JSON array)
    pub queue_path: PathBuf,
    /// Path to the SQLite cache database used by the cache worker
    pub cache_db_path: PathBuf,
    /// Address the cache worker proxy binds to
    pub worker_addr: SocketAddr,
    /// Address the request gateway binds to
    pub gateway_addr: SocketAddr,
    /// Recurring sync interval while online with a non-empty queue
    pub sync_interval: Duration,
    /// Cache version; bumped on each deployment to invalidate stale entries
    pub cache_version: u32,
    /// Initial bearer token for backend requests, if any
    pub auth_token: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let backend_url = env::var("SYNC_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let queue_path = env::var("SYNC_QUEUE_PATH")
            .unwrap_or_else(|_| "./data/pendingActions.json".to_string())
            .into();

        let cache_db_path = env::var("SYNC_CACHE_DB_PATH")
            .unwrap_or_else(|_| "./data/cache.sqlite".to_string())
            .into();

        let worker_addr = env::var("SYNC_WORKER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:9180".to_string())
            .parse()
            .expect("Invalid SYNC_WORKER_ADDR format");

        let gateway_addr = env::var("SYNC_GATEWAY_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:9181".to_string())
            .parse()
            .expect("Invalid SYNC_GATEWAY_ADDR format");

        let sync_interval = env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let cache_version = env::var("SYNC_CACHE_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let auth_token = env::var("SYNC_AUTH_TOKEN").ok();

        let log_level = env::var("SYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            backend_url,
            queue_path,
            cache_db_path,
            worker_addr,
            gateway_addr,
            sync_interval,
            cache_version,
            auth_token,
            log_level,
        }
    }
}
