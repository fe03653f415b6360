//! HTTP server exposing ingest status.
//!
//! Provides endpoints for:
//! - Liveness
//! - Cursor position, next target and cycle counters
//! - Prometheus exposition of the cycle counters

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::cursor;
use crate::dataset::Dataset;
use crate::state::{format_cursor_date, StateStore};
use crate::status::{CycleReport, CycleTracker};

const SERVICE_NAME: &str = "meteosat-ingest";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub source: String,
    pub collection: String,
    /// Last scene fully processed, if any
    pub cursor_date: Option<String>,
    pub last_updated: Option<String>,
    /// Scene the next cycle will look for
    pub next_target: String,
    pub composites: Vec<String>,
    pub cycles: CycleReport,
}

// ============================================================================
// Shared State
// ============================================================================

pub struct ServerState {
    pub store: Arc<StateStore>,
    pub tracker: Arc<CycleTracker>,
    pub dataset: Dataset,
    /// Renders `/metrics`; the route answers 404 without one
    pub metrics: Option<PrometheusHandle>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status - Cursor position and cycle counters
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let cursor_state = match state.store.read() {
        Ok(s) => s,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let next_target = cursor::next_target(&cursor_state, Utc::now());

    let response = StatusResponse {
        service: SERVICE_NAME.to_string(),
        source: state.dataset.source.clone(),
        collection: state.dataset.collection.clone(),
        cursor_date: cursor_state.date.map(format_cursor_date),
        last_updated: cursor_state.last_updated,
        next_target: format_cursor_date(next_target),
        composites: state.dataset.composite_names(),
        cycles: state.tracker.snapshot(),
    };

    Json(response).into_response()
}

/// GET /health - Liveness check
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics - Prometheus text format
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Run the status server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
