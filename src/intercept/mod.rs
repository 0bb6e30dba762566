//! Request interceptor.
//!
//! Single entry point for backend requests that makes callers agnostic to
//! connectivity. Mutations that cannot reach the network are queued and
//! answered with a synthetic 202; offline reads are served through the cache
//! worker or fail with an offline error. Callers therefore see one of three
//! things: a normal response, a cached response, or a 202 "queued" response
//! (accepted but not yet durable on the server).

use std::sync::Arc;

use crate::auth::SessionTokens;
use crate::errors::AppError;
use crate::models::{MutatingMethod, QueuedResponse};
use crate::monitor::ConnectivityMonitor;
use crate::store::PendingActionStore;

/// Message carried in the synthetic 202 body.
const QUEUED_MESSAGE: &str = "Action queued for sync when connection is restored";
/// Error message for an offline read with no cached fallback.
const NO_CACHED_DATA: &str = "No connection and no cached data";

/// A response as seen by interceptor callers.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// True when this is a synthetic 202 for a queued mutation.
    pub queued: bool,
}

impl InterceptedResponse {
    fn queued() -> Self {
        let body = QueuedResponse::new(QUEUED_MESSAGE);
        Self {
            status: 202,
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(&body).unwrap_or_default(),
            queued: true,
        }
    }

    async fn from_network(response: reqwest::Response) -> Result<Self, AppError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.bytes().await?.to_vec();

        Ok(Self {
            status,
            content_type,
            body,
            queued: false,
        })
    }
}

pub struct RequestInterceptor {
    client: reqwest::Client,
    backend_url: String,
    /// Origin of the cache worker proxy; reads go through it so the runtime
    /// cache fills on success and answers on failure.
    worker_url: Option<String>,
    store: Arc<PendingActionStore>,
    monitor: Arc<ConnectivityMonitor>,
    tokens: Arc<SessionTokens>,
}

impl RequestInterceptor {
    pub fn new(
        client: reqwest::Client,
        backend_url: impl Into<String>,
        worker_url: Option<String>,
        store: Arc<PendingActionStore>,
        monitor: Arc<ConnectivityMonitor>,
        tokens: Arc<SessionTokens>,
    ) -> Self {
        Self {
            client,
            backend_url: backend_url.into(),
            worker_url,
            store,
            monitor,
            tokens,
        }
    }

    /// Issue a request to the backend, queuing mutations that cannot reach
    /// the network. `path` is the endpoint path-and-query; `body` is the JSON
    /// payload for mutating verbs.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<InterceptedResponse, AppError> {
        let mutating = MutatingMethod::from_method(&method);

        if !self.monitor.is_online() {
            return match mutating {
                // Skip the network attempt entirely.
                Some(m) => Ok(self.queue_action(path, m, body)),
                None if method == reqwest::Method::GET => self.read_from_cache(path).await,
                None => Err(AppError::Offline(NO_CACHED_DATA.to_string())),
            };
        }

        match self.forward(method, path, &body).await {
            Ok(response) => InterceptedResponse::from_network(response).await,
            Err(e) => match mutating {
                Some(m) => {
                    tracing::warn!("{} {} failed ({}), queuing for sync", m, path, e);
                    Ok(self.queue_action(path, m, body))
                }
                // Reads are never queued; surface the failure.
                None => Err(AppError::from(e)),
            },
        }
    }

    /// Send the request over the network. Reads go through the cache worker
    /// when one is configured, mutations go straight to the backend.
    async fn forward(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Option<serde_json::Value>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let origin = match (&self.worker_url, MutatingMethod::from_method(&method)) {
            (Some(worker), None) => worker.as_str(),
            _ => self.backend_url.as_str(),
        };

        let mut request = self.client.request(method, format!("{}{}", origin, path));
        if let Some(token) = self.tokens.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(json) = body {
            request = request.json(json);
        }
        request.send().await
    }

    fn queue_action(
        &self,
        path: &str,
        method: MutatingMethod,
        body: Option<serde_json::Value>,
    ) -> InterceptedResponse {
        self.store
            .enqueue(path, method, body.unwrap_or(serde_json::Value::Null));
        InterceptedResponse::queued()
    }

    /// Offline read: ask the cache worker, which falls back to its runtime
    /// cache. A worker 503 marked `offline` (or no worker at all) means there
    /// is no connection and no cached data.
    async fn read_from_cache(&self, path: &str) -> Result<InterceptedResponse, AppError> {
        let Some(worker) = &self.worker_url else {
            return Err(AppError::Offline(NO_CACHED_DATA.to_string()));
        };

        let response = self
            .client
            .get(format!("{}{}", worker, path))
            .send()
            .await
            .map_err(|_| AppError::Offline(NO_CACHED_DATA.to_string()))?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(AppError::Offline(NO_CACHED_DATA.to_string()));
        }

        InterceptedResponse::from_network(response).await
    }
}
