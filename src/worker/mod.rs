//! Installable cache worker.
//!
//! Runs detached from the console pages as a local proxy task intercepting
//! every fetch for the origin. Two strategies:
//!
//! - static assets: cache-first against the versioned static cache
//! - API GETs: network-first, falling back to the runtime cache, with a
//!   synthetic 503 `{ error: "Offline", offline: true }` on a total miss
//!
//! Everything else (HEAD/POST/...) passes straight through and is never
//! cached. The worker shares no memory with the pages; it is controlled only
//! through this fetch contract and explicit posted messages.

mod cache;

pub use cache::*;

use std::sync::{Arc, RwLock};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::models::{OfflineError, WorkerMessage};

/// Core assets pre-cached at install time.
const PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/offline.html",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

/// The two versioned cache names for a deployment.
pub fn cache_names(version: u32) -> (String, String) {
    (
        format!("assetops-static-v{}", version),
        format!("assetops-runtime-v{}", version),
    )
}

/// Worker lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Installing,
    /// Installed, waiting to take over from a previous version.
    Waiting,
    Active,
}

#[derive(Clone)]
pub struct CacheWorker {
    cache: CacheStore,
    client: reqwest::Client,
    backend_url: String,
    static_cache: String,
    runtime_cache: String,
    phase: Arc<RwLock<WorkerPhase>>,
}

impl CacheWorker {
    pub fn new(
        cache: CacheStore,
        client: reqwest::Client,
        backend_url: impl Into<String>,
        cache_version: u32,
    ) -> Self {
        let (static_cache, runtime_cache) = cache_names(cache_version);
        Self {
            cache,
            client,
            backend_url: backend_url.into(),
            static_cache,
            runtime_cache,
            phase: Arc::new(RwLock::new(WorkerPhase::Installing)),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase.read().map(|p| *p).unwrap_or(WorkerPhase::Installing)
    }

    fn set_phase(&self, phase: WorkerPhase) {
        if let Ok(mut p) = self.phase.write() {
            *p = phase;
        }
    }

    /// Install: pre-populate the static cache with the core asset manifest.
    /// Assets that cannot be fetched are skipped and picked up later by the
    /// cache-first path.
    pub async fn install(&self) -> Result<(), AppError> {
        tracing::info!("Installing cache worker ({})", self.static_cache);

        for path in PRECACHE_MANIFEST {
            let url = format!("{}{}", self.backend_url, path);
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    let content_type = response_content_type(&response);
                    let body = response.bytes().await?;
                    self.cache
                        .put(&self.static_cache, path, status, &content_type, &body)
                        .await?;
                }
                Ok(response) => {
                    tracing::warn!("Precache of {} skipped: {}", path, response.status());
                }
                Err(e) => {
                    tracing::warn!("Precache of {} skipped: {}", path, e);
                }
            }
        }

        self.set_phase(WorkerPhase::Waiting);
        Ok(())
    }

    /// Activate: delete every cache with a stale name, then serve.
    pub async fn activate(&self) -> Result<(), AppError> {
        let removed = self
            .cache
            .delete_except(&self.static_cache, &self.runtime_cache)
            .await?;
        if removed > 0 {
            tracing::info!("Activated cache worker, dropped {} stale cache entries", removed);
        } else {
            tracing::info!("Activated cache worker");
        }

        self.set_phase(WorkerPhase::Active);
        Ok(())
    }

    /// Handle a control message posted by the page.
    pub async fn handle_message(&self, message: WorkerMessage) {
        match message {
            WorkerMessage::SkipWaiting => {
                if self.phase() != WorkerPhase::Active {
                    tracing::info!("Skip-waiting received, activating immediately");
                    if let Err(e) = self.activate().await {
                        tracing::error!("Activation failed: {}", e);
                    }
                }
            }
        }
    }

    /// Create the worker router: the fetch-interception fallback plus the
    /// message endpoint the page posts control messages to.
    pub fn router(&self, control: WorkerHandle) -> Router {
        let message_route = Router::new()
            .route("/worker/message", post(receive_message))
            .with_state(control);
        let fetch_routes = Router::new().fallback(handle_fetch).with_state(self.clone());

        message_route
            .merge(fetch_routes)
            .layer(TraceLayer::new_for_http())
    }

    /// Static assets: serve from cache if present, otherwise fetch and cache.
    async fn cache_first(&self, path: &str, auth: Option<&str>) -> Response {
        match self.cache.get(&self.static_cache, path).await {
            Ok(Some(hit)) => return cached_response(hit),
            Ok(None) => {}
            Err(e) => return e.into_response(),
        }

        match self.fetch_upstream(reqwest::Method::GET, path, auth, None).await {
            Ok(response) if response.status().is_success() => {
                match self.cache_and_build(&self.static_cache, path, response).await {
                    Ok(built) => built,
                    Err(e) => e.into_response(),
                }
            }
            Ok(response) => passthrough_response(response).await,
            Err(e) => {
                tracing::debug!("Static fetch of {} failed: {}", path, e);
                offline_response("Offline and asset not cached")
            }
        }
    }

    /// API GETs: try the network, cache on success, fall back to the runtime
    /// cache on failure.
    async fn network_first(&self, path: &str, auth: Option<&str>) -> Response {
        match self.fetch_upstream(reqwest::Method::GET, path, auth, None).await {
            Ok(response) if response.status().is_success() => {
                match self.cache_and_build(&self.runtime_cache, path, response).await {
                    Ok(built) => built,
                    Err(e) => e.into_response(),
                }
            }
            Ok(response) => passthrough_response(response).await,
            Err(e) => {
                tracing::debug!("Network-first fetch of {} failed: {}", path, e);
                match self.cache.get(&self.runtime_cache, path).await {
                    Ok(Some(hit)) => cached_response(hit),
                    Ok(None) => offline_response("No cached data available for this request"),
                    Err(e) => e.into_response(),
                }
            }
        }
    }

    /// Everything non-GET: straight to the network, never cached.
    async fn pass_through(
        &self,
        method: reqwest::Method,
        path: &str,
        auth: Option<&str>,
        body: Vec<u8>,
    ) -> Response {
        let body = if body.is_empty() { None } else { Some(body) };
        match self.fetch_upstream(method, path, auth, body).await {
            Ok(response) => passthrough_response(response).await,
            Err(e) => AppError::from(e).into_response(),
        }
    }

    async fn fetch_upstream(
        &self,
        method: reqwest::Method,
        path: &str,
        auth: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.backend_url, path));
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        request.send().await
    }

    /// Store a successful upstream response and build the reply from the
    /// stored copy.
    async fn cache_and_build(
        &self,
        cache_name: &str,
        path: &str,
        response: reqwest::Response,
    ) -> Result<Response, AppError> {
        let status = response.status().as_u16();
        let content_type = response_content_type(&response);
        let body = response.bytes().await?;

        self.cache
            .put(cache_name, path, status, &content_type, &body)
            .await?;

        Ok(cached_response(CachedResponse {
            status,
            content_type,
            body: body.to_vec(),
            stored_at: String::new(),
        }))
    }
}

/// POST /worker/message - Control message posted by the page.
async fn receive_message(
    State(control): State<WorkerHandle>,
    Json(message): Json<WorkerMessage>,
) -> StatusCode {
    if control.post_message(message).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Fallback handler: route by method and path.
async fn handle_fetch(State(worker): State<CacheWorker>, request: Request) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let auth = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let method = request.method().clone();

    if method == axum::http::Method::GET {
        return if path.starts_with("/api") {
            worker.network_first(&path, auth.as_deref()).await
        } else {
            worker.cache_first(&path, auth.as_deref()).await
        };
    }

    let body = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            return AppError::BadRequest(format!("Failed to read body: {}", e)).into_response()
        }
    };

    let method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            return AppError::BadRequest(format!("Unsupported method {}", method)).into_response()
        }
    };

    worker.pass_through(method, &path, auth.as_deref(), body).await
}

fn response_content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn cached_response(hit: CachedResponse) -> Response {
    let status = StatusCode::from_u16(hit.status).unwrap_or(StatusCode::OK);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, hit.content_type)
        .body(Body::from(hit.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn passthrough_response(response: reqwest::Response) -> Response {
    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response_content_type(&response);

    match response.bytes().await {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => AppError::from(e).into_response(),
    }
}

fn offline_response(message: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(OfflineError::new(message)),
    )
        .into_response()
}

/// Handle for posting control messages to a spawned worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    /// Post a message to the worker. Returns false if the worker is gone.
    pub async fn post_message(&self, message: WorkerMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }
}

/// Spawn the worker's control-message loop and return a handle for posting.
pub fn spawn_control_loop(worker: CacheWorker) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            worker.handle_message(message).await;
        }
    });
    WorkerHandle { tx }
}
