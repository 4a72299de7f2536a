//! Document store — content-addressed, deduplicating storage for raw
//! ingested documents.
//!
//! Documents are keyed by the hex SHA-256 of their raw bytes. A `put` of
//! already-known content merges the new URL into the existing document's
//! known-URL set instead of creating a duplicate. Writes are transactional
//! and committed before `put` returns; transient storage errors are retried
//! with bounded exponential backoff before surfacing a fatal error.

use std::time::Duration;

use chrono::{DateTime, Utc};
use signet_core::config::DatabaseConfig;
use signet_core::models::{content_hash, Document, RawDocument};
use signet_core::SignetError;
use sqlx::SqlitePool;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Result of a `put`: the stored (or pre-existing) document, and whether the
/// content hash was already known.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub document: Document,
    pub deduplicated: bool,
}

/// Store a raw document, deduplicating by content hash.
pub async fn put(
    pool: &SqlitePool,
    raw: &RawDocument,
    config: &DatabaseConfig,
) -> Result<PutOutcome, SignetError> {
    let retry_strategy = ExponentialBackoff::from_millis(config.retry_delay_ms)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(config.retry_attempts);

    let result = Retry::spawn(retry_strategy, || put_once(pool, raw)).await;

    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!(
                attempts = config.retry_attempts,
                error = %e,
                "All document store write attempts failed"
            );
            Err(SignetError::RetryExhausted {
                attempts: config.retry_attempts,
                last: e.to_string(),
            })
        }
    }
}

/// Fetch a document by content hash.
pub async fn get(pool: &SqlitePool, id: &str) -> Result<Document, SignetError> {
    fetch_document(pool, id)
        .await?
        .ok_or_else(|| SignetError::NotFound(format!("document {}", id)))
}

async fn put_once(pool: &SqlitePool, raw: &RawDocument) -> Result<PutOutcome, sqlx::Error> {
    let hash = content_hash(raw.bytes());

    let mut tx = pool.begin().await?;

    let existing: Option<DocumentRow> = sqlx::query_as(
        "SELECT id, source, urls, retrieved_at, raw_text, language FROM documents WHERE id = ?1",
    )
    .bind(&hash)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(row) = existing {
        let mut document = row_to_document(row)?;

        if !document.urls.contains(&raw.url) {
            document.urls.push(raw.url.clone());
            document.urls.sort();

            let urls_json = encode_urls(&document.urls)?;
            sqlx::query("UPDATE documents SET urls = ?1 WHERE id = ?2")
                .bind(urls_json)
                .bind(&hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(id = %hash, url = %raw.url, "Document deduplicated by content hash");
        return Ok(PutOutcome {
            document,
            deduplicated: true,
        });
    }

    let document = Document {
        id: hash.clone(),
        source: raw.source.clone(),
        urls: vec![raw.url.clone()],
        retrieved_at: raw.retrieved_at,
        raw_text: String::from_utf8_lossy(raw.bytes()).into_owned(),
        language: raw.language.clone(),
    };

    sqlx::query(
        r#"
        INSERT INTO documents (id, source, urls, retrieved_at, raw_text, language)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&document.id)
    .bind(&document.source)
    .bind(encode_urls(&document.urls)?)
    .bind(document.retrieved_at)
    .bind(&document.raw_text)
    .bind(&document.language)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PutOutcome {
        document,
        deduplicated: false,
    })
}

type DocumentRow = (String, String, String, DateTime<Utc>, String, String);

async fn fetch_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>, sqlx::Error> {
    let row: Option<DocumentRow> = sqlx::query_as(
        "SELECT id, source, urls, retrieved_at, raw_text, language FROM documents WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_document).transpose()
}

fn row_to_document(row: DocumentRow) -> Result<Document, sqlx::Error> {
    let (id, source, urls, retrieved_at, raw_text, language) = row;
    let urls: Vec<String> =
        serde_json::from_str(&urls).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Document {
        id,
        source,
        urls,
        retrieved_at,
        raw_text,
        language,
    })
}

fn encode_urls(urls: &[String]) -> Result<String, sqlx::Error> {
    serde_json::to_string(urls).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

// ============================================================================
// TESTS
// ============================================================================
