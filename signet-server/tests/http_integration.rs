//! HTTP integration tests for the Signet REST API.
//!
//! Uses both the inner-function approach and full Axum `oneshot` dispatch,
//! against an in-memory SQLite pool.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{raw_document, test_config, test_pool, test_registry};
use signet_server::http::{
    build_router, health_inner, scores_inner, timeline_inner, version_inner, HttpState,
    ScoresParams,
};
use tokio::sync::broadcast;
use tower::ServiceExt;

async fn make_state(dir: &std::path::Path) -> Arc<HttpState> {
    let (shutdown_tx, _) = broadcast::channel(1);
    Arc::new(HttpState {
        pool: test_pool().await,
        config: test_config(dir),
        registry: test_registry(),
        shutdown_tx,
    })
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_inner_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).await;

    let (status, body) = health_inner(&state.pool, "/tmp/signet.sock").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    assert!(body["sqlite"].is_string());
    assert!(body["socket"].is_string());
}

#[tokio::test]
async fn test_version_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).await;
    let app = build_router(state);

    let req = Request::builder()
        .method("GET")
        .uri("/version")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert!(json["version"].is_string());
    assert_eq!(json["protocol"], "signet/1");

    // The pure inner function agrees with the dispatched handler
    assert_eq!(version_inner()["protocol"], "signet/1");
}

#[tokio::test]
async fn test_ingest_then_query_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).await;
    let app = build_router(state.clone());

    let documents = vec![
        raw_document(
            "TechniqueX deployed 2023-01",
            "https://a.example/1",
            "2024-06-01T00:00:00Z",
        ),
        raw_document(
            "TechniqueX was tested 2024-01",
            "https://a.example/2",
            "2024-06-01T00:00:00Z",
        ),
    ];

    let req = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&documents).unwrap()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["documents_processed"], 2);
    assert_eq!(json["documents_failed"], 0);
    assert!(json["took_ms"].is_u64());

    // Entities listing sees the technique
    let req = Request::builder()
        .method("GET")
        .uri("/entities")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["entities"][0]["canonical_name"], "TechniqueX");

    // Timeline over HTTP, by name
    let req = Request::builder()
        .method("GET")
        .uri("/entities/TechniqueX/timeline")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["claims"].as_array().unwrap().len(), 2);

    // Sweep, then read the score series back
    let req = Request::builder()
        .method("POST")
        .uri("/sweep")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["points_appended"], 1);

    let req = Request::builder()
        .method("GET")
        .uri("/entities/TechniqueX/scores")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["count"], 1);
    let value = json["points"][0]["value"].as_f64().unwrap();
    assert!(value > 0.0 && value <= 1.0);
}

#[tokio::test]
async fn test_unknown_entity_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).await;

    let (status, body) = timeline_inner(&state.pool, "NoSuchThing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    let (status, _) = scores_inner(&state.pool, "NoSuchThing", ScoresParams::default()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Same through full dispatch
    let app = build_router(state);
    let req = Request::builder()
        .method("GET")
        .uri("/entities/NoSuchThing/timeline")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scores_range_params() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path()).await;
    let app = build_router(state.clone());

    let documents = vec![raw_document(
        "TechniqueX deployed 2023-01",
        "https://a.example/1",
        "2024-06-01T00:00:00Z",
    )];
    let req = Request::builder()
        .method("POST")
        .uri("/ingest")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&documents).unwrap()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/sweep")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(req).await.unwrap();

    // A range in the past excludes today's sweep point
    let req = Request::builder()
        .method("GET")
        .uri("/entities/TechniqueX/scores?from=2020-01-01&to=2020-12-31")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["count"], 0);
}
