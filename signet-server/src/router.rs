use chrono::Utc;
use signet_core::ipc::{SignetRequest, SignetResponse};
use signet_core::SignetConfig;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::subsystems::{aggregate::EntityRegistry, ingest, query, score};

/// Dispatch one IPC request. `shutdown` lets a server shutdown abort an
/// in-flight ingestion batch between documents.
pub async fn handle_request(
    request: SignetRequest,
    pool: &SqlitePool,
    registry: &EntityRegistry,
    config: &SignetConfig,
    shutdown: Option<broadcast::Receiver<()>>,
) -> SignetResponse {
    match request {
        SignetRequest::Ping => SignetResponse::pong(),
        SignetRequest::Health => match signet_core::db::health_check(pool).await {
            Ok(version) => SignetResponse::ok(serde_json::json!({
                "sqlite": version,
                "status": "healthy"
            })),
            Err(e) => SignetResponse::err(format!("DB health check failed: {}", e)),
        },
        SignetRequest::Ingest { documents } => {
            let report = ingest::ingest_batch(pool, registry, config, &documents, shutdown).await;
            match serde_json::to_value(&report) {
                Ok(data) => SignetResponse::ok(data),
                Err(e) => SignetResponse::err(format!("Failed to encode batch report: {}", e)),
            }
        }
        SignetRequest::Entities => match query::list_entities(pool).await {
            Ok(entities) => SignetResponse::ok(serde_json::json!({
                "count": entities.len(),
                "entities": entities
            })),
            Err(e) => SignetResponse::err(e.to_string()),
        },
        SignetRequest::Timeline { entity } => match query::get_timeline(pool, &entity).await {
            Ok(timeline) => match serde_json::to_value(&timeline) {
                Ok(data) => SignetResponse::ok(data),
                Err(e) => SignetResponse::err(format!("Failed to encode timeline: {}", e)),
            },
            Err(e) => SignetResponse::err(e.to_string()),
        },
        SignetRequest::Scores { entity, from, to } => {
            match query::get_score_series(pool, &entity, from, to).await {
                Ok(points) => SignetResponse::ok(serde_json::json!({
                    "count": points.len(),
                    "points": points
                })),
                Err(e) => SignetResponse::err(e.to_string()),
            }
        }
        SignetRequest::Sweep => {
            match score::run_scoring_sweep(pool, &config.scoring, Utc::now().date_naive()).await {
                Ok(report) => SignetResponse::ok(serde_json::json!({
                    "entities_scored": report.entities_scored,
                    "points_appended": report.points_appended,
                    "points_skipped": report.points_skipped,
                    "elapsed_ms": report.elapsed_ms,
                })),
                Err(e) => SignetResponse::err(e.to_string()),
            }
        }
    }
}
