//! Request gateway.
//!
//! Local HTTP surface the console UI talks to. Every request is handed to
//! the request interceptor, so the UI never has to special-case offline. A
//! small `/agent/status` endpoint feeds the connectivity badge.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::SessionTokens;
use crate::errors::AppError;
use crate::intercept::{InterceptedResponse, RequestInterceptor};
use crate::monitor::ConnectivityMonitor;
use crate::store::PendingActionStore;

/// Gateway state shared across handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub interceptor: Arc<RequestInterceptor>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub store: Arc<PendingActionStore>,
    pub tokens: Arc<SessionTokens>,
}

/// Create the gateway router.
pub fn create_router(state: GatewayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/agent/status", get(agent_status))
        .route("/agent/session", put(update_session))
        .fallback(proxy_request)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status payload for the UI connectivity indicator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentStatus {
    online: bool,
    pending_actions: usize,
}

/// GET /agent/status - Connection status and queue depth.
async fn agent_status(State(state): State<GatewayState>) -> Json<AgentStatus> {
    Json(AgentStatus {
        online: state.monitor.is_online(),
        pending_actions: state.store.len(),
    })
}

/// Session token update pushed by the console on login/refresh/logout.
#[derive(Debug, Deserialize)]
struct SessionUpdate {
    token: Option<String>,
}

/// PUT /agent/session - Replace the bearer token used for backend requests.
async fn update_session(
    State(state): State<GatewayState>,
    Json(update): Json<SessionUpdate>,
) -> StatusCode {
    state.tokens.set_bearer(update.token);
    StatusCode::NO_CONTENT
}

/// Fallback handler: forward any request through the interceptor.
async fn proxy_request(State(state): State<GatewayState>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let body = match read_json_body(request).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            return AppError::BadRequest(format!("Unsupported method {}", method)).into_response()
        }
    };

    match state.interceptor.request(method, &path, body).await {
        Ok(intercepted) => intercepted_into_response(intercepted),
        Err(e) => e.into_response(),
    }
}

/// Read and parse an optional JSON request body.
async fn read_json_body(request: Request) -> Result<Option<serde_json::Value>, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read body: {}", e)))?;

    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn intercepted_into_response(intercepted: InterceptedResponse) -> Response {
    let status =
        StatusCode::from_u16(intercepted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, intercepted.content_type)
        .body(Body::from(intercepted.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
