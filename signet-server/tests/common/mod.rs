use std::sync::Arc;

use signet_core::config::{
    AggregationConfig, DatabaseConfig, ExtractionConfig, HttpConfig, ScoringConfig, ServiceConfig,
};
use signet_core::models::RawDocument;
use signet_core::SignetConfig;
use signet_server::subsystems::aggregate::EntityRegistry;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory sqlite");
    signet_core::db::init_schema(&pool)
        .await
        .expect("Failed to init schema");
    pool
}

pub fn test_config(inbox_dir: &std::path::Path) -> SignetConfig {
    SignetConfig {
        service: ServiceConfig {
            socket_path: "/tmp/signet-test.sock".to_string(),
            log_level: "info".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            retry_attempts: 3,
            retry_delay_ms: 10,
        },
        http: HttpConfig::default(),
        extraction: ExtractionConfig::default(),
        aggregation: AggregationConfig {
            review_inbox: inbox_dir.join("inbox.md").to_string_lossy().into_owned(),
            ..Default::default()
        },
        scoring: ScoringConfig::default(),
    }
}

pub fn test_registry() -> Arc<EntityRegistry> {
    Arc::new(EntityRegistry::new())
}

pub fn raw_document(text: &str, url: &str, retrieved_at: &str) -> RawDocument {
    RawDocument {
        source: "arxiv".to_string(),
        url: url.to_string(),
        language: "en".to_string(),
        retrieved_at: retrieved_at.parse().expect("test timestamp"),
        text: text.to_string(),
    }
}
