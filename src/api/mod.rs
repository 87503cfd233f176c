//! HTTP status surface for the supervisor.

pub mod auth;
pub mod stream;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agents::{AGENT_NAMES, AGENT_VERSION};
use crate::error::{Result, ShowcaseError};
use crate::supervisor::{ProcessStatus, Supervisor, SupervisorStatus};
use auth::auth_middleware;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail<T>(code: StatusCode, message: String) -> Reply<T> {
    (code, Json(ApiResponse::error(message)))
}

#[derive(Clone)]
pub struct ApiState {
    pub supervisor: Arc<Supervisor>,
    pub api_token: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/status", get(get_status))
        .route("/agents", get(list_agents))
        .route("/agents/:name", get(get_agent))
        .route("/agents/:name/start", post(start_agent))
        .route("/agents/:name/stop", post(stop_agent))
        .route("/agents/:name/restart", post(restart_agent))
        .route("/events", get(stream::sse_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the status API on `port` until `shutdown` resolves.
pub async fn start_api_server<F>(state: ApiState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ShowcaseError::NetworkError(format!("Cannot bind status API on {}: {}", addr, e)))?;
    info!("Status API listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<ApiState>) -> Reply<Value> {
    let status = state.supervisor.status().await;
    ok(json!({
        "status": "ok",
        "version": AGENT_VERSION,
        "uptime_secs": status.uptime.as_secs(),
    }))
}

async fn get_status(State(state): State<ApiState>) -> Reply<SupervisorStatus> {
    ok(state.supervisor.status().await)
}

async fn list_agents(State(state): State<ApiState>) -> Reply<Vec<ProcessStatus>> {
    ok(state.supervisor.statuses().await)
}

async fn get_agent(State(state): State<ApiState>, Path(name): Path<String>) -> Reply<ProcessStatus> {
    match state.supervisor.agent_status(&name).await {
        Some(status) => ok(status),
        None => fail(StatusCode::NOT_FOUND, format!("Agent {} not found", name)),
    }
}

async fn start_agent(State(state): State<ApiState>, Path(name): Path<String>) -> Reply<u32> {
    if !AGENT_NAMES.contains(&name.as_str()) {
        return fail(StatusCode::NOT_FOUND, format!("Unknown agent '{}'", name));
    }
    match state.supervisor.start_agent(&name).await {
        Ok(pid) => ok(pid),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to start agent {}: {}", name, e)),
    }
}

async fn stop_agent(State(state): State<ApiState>, Path(name): Path<String>) -> Reply<String> {
    match state.supervisor.stop_agent(&name).await {
        Ok(()) => ok(format!("Agent {} stopped", name)),
        Err(e) => fail(StatusCode::NOT_FOUND, format!("Failed to stop agent {}: {}", name, e)),
    }
}

async fn restart_agent(State(state): State<ApiState>, Path(name): Path<String>) -> Reply<u32> {
    if state.supervisor.agent_status(&name).await.is_none() {
        return fail(StatusCode::NOT_FOUND, format!("Agent {} not found", name));
    }
    match state.supervisor.restart_agent(&name).await {
        Ok(pid) => ok(pid),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to restart agent {}: {}", name, e)),
    }
}
