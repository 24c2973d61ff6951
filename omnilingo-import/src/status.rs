//! Status endpoint served while an import runs
//!
//! - `GET /health`: liveness, version and uptime
//! - `GET /progress`: chunk counters and per-worker activity

use crate::engine::{ProgressSnapshot, ProgressTracker};
use crate::error::ImportResult;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared state of the status router
#[derive(Clone)]
pub struct StatusState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tracker: Arc<ProgressTracker>,
}

impl StatusState {
    pub fn new(run_id: Uuid, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            tracker,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Progress response
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
}

/// GET /health
pub async fn health_check(State(state): State<StatusState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.started_at);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// GET /progress
pub async fn progress(State(state): State<StatusState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        run_id: state.run_id,
        started_at: state.started_at,
        progress: state.tracker.snapshot(),
    })
}

pub fn build_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/progress", get(progress))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the status router in the background
///
/// Returns the bound address (useful with port 0) and the server task, which
/// the caller aborts when the run ends.
pub async fn spawn(addr: SocketAddr, state: StatusState) -> ImportResult<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Status endpoint: http://{}/progress", local_addr);

    let app = build_router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Status endpoint stopped");
        }
    });

    Ok((local_addr, handle))
}
