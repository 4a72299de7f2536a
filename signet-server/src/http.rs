//! Signet HTTP REST API
//!
//! Axum-based HTTP server exposing the ingestion pipeline and the read-only
//! dashboard query surface. Runs alongside the Unix socket IPC server.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                    — health check with DB status
//! - GET  /version                   — server version info
//! - POST /ingest                    — ingest a batch of raw documents
//! - GET  /entities                  — list known entities
//! - GET  /entities/:entity/timeline — ordered claim history
//! - GET  /entities/:entity/scores   — score series (from/to bounds)
//! - POST /sweep                     — trigger a scoring sweep

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use signet_core::models::RawDocument;
use signet_core::{SignetConfig, SignetError};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::subsystems::aggregate::EntityRegistry;
use crate::subsystems::{ingest, query, score};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: SqlitePool,
    pub config: SignetConfig,
    pub registry: Arc<EntityRegistry>,
    pub shutdown_tx: broadcast::Sender<()>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/ingest", post(ingest_handler))
        .route("/entities", get(entities_handler))
        .route("/entities/:entity/timeline", get(timeline_handler))
        .route("/entities/:entity/scores", get(scores_handler))
        .route("/sweep", post(sweep_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Signet HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ScoresParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!(ErrorResponse::new(msg))
}

fn query_error_status(e: &SignetError) -> StatusCode {
    match e {
        SignetError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &SqlitePool, socket_path: &str) -> (StatusCode, serde_json::Value) {
    let sqlite_ver = match signet_core::db::health_check(pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "sqlite": sqlite_ver,
            "socket": socket_path,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "signet/1",
    })
}

/// Inner ingest — runs the batch and reports per-document outcomes.
pub async fn ingest_inner(
    state: &HttpState,
    documents: Vec<RawDocument>,
) -> (StatusCode, serde_json::Value) {
    let start = Instant::now();

    let report = ingest::ingest_batch(
        &state.pool,
        &state.registry,
        &state.config,
        &documents,
        Some(state.shutdown_tx.subscribe()),
    )
    .await;

    let took_ms = start.elapsed().as_millis() as u64;

    match serde_json::to_value(&report) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
            }
            (StatusCode::OK, data)
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(format!("Failed to encode batch report: {}", e)),
        ),
    }
}

/// Inner entity listing.
pub async fn entities_inner(pool: &SqlitePool) -> (StatusCode, serde_json::Value) {
    match query::list_entities(pool).await {
        Ok(entities) => (
            StatusCode::OK,
            serde_json::json!({
                "count": entities.len(),
                "entities": entities,
            }),
        ),
        Err(e) => (query_error_status(&e), error_body(e.to_string())),
    }
}

/// Inner timeline read.
pub async fn timeline_inner(pool: &SqlitePool, entity: &str) -> (StatusCode, serde_json::Value) {
    match query::get_timeline(pool, entity).await {
        Ok(timeline) => match serde_json::to_value(&timeline) {
            Ok(data) => (StatusCode::OK, data),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(format!("Failed to encode timeline: {}", e)),
            ),
        },
        Err(e) => (query_error_status(&e), error_body(e.to_string())),
    }
}

/// Inner score series read.
pub async fn scores_inner(
    pool: &SqlitePool,
    entity: &str,
    params: ScoresParams,
) -> (StatusCode, serde_json::Value) {
    match query::get_score_series(pool, entity, params.from, params.to).await {
        Ok(points) => (
            StatusCode::OK,
            serde_json::json!({
                "count": points.len(),
                "points": points,
            }),
        ),
        Err(e) => (query_error_status(&e), error_body(e.to_string())),
    }
}

/// Inner sweep trigger.
pub async fn sweep_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let as_of = Utc::now().date_naive();
    match score::run_scoring_sweep(&state.pool, &state.config.scoring, as_of).await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::json!({
                "entities_scored": report.entities_scored,
                "points_appended": report.points_appended,
                "points_skipped": report.points_skipped,
                "elapsed_ms": report.elapsed_ms,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(e.to_string()),
        ),
    }
}

// ============================================================================
// Thin axum handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool, &state.config.service.socket_path).await;
    (status, Json(body))
}

async fn version_handler() -> impl IntoResponse {
    Json(version_inner())
}

async fn ingest_handler(
    State(state): State<Arc<HttpState>>,
    Json(documents): Json<Vec<RawDocument>>,
) -> impl IntoResponse {
    let (status, body) = ingest_inner(&state, documents).await;
    (status, Json(body))
}

async fn entities_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = entities_inner(&state.pool).await;
    (status, Json(body))
}

async fn timeline_handler(
    State(state): State<Arc<HttpState>>,
    Path(entity): Path<String>,
) -> impl IntoResponse {
    let (status, body) = timeline_inner(&state.pool, &entity).await;
    (status, Json(body))
}

async fn scores_handler(
    State(state): State<Arc<HttpState>>,
    Path(entity): Path<String>,
    Query(params): Query<ScoresParams>,
) -> impl IntoResponse {
    let (status, body) = scores_inner(&state.pool, &entity, params).await;
    (status, Json(body))
}

async fn sweep_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = sweep_inner(&state).await;
    (status, Json(body))
}
