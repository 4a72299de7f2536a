//! Batch ingestion — drives collector output through the pipeline:
//! store (content-addressed put) → extract → merge, atomically per
//! document.
//!
//! A batch never rolls back as a whole: each document succeeds or fails on
//! its own and the report says which did what. A shutdown signal aborts the
//! batch between documents, never inside one.

use serde::{Deserialize, Serialize};
use signet_core::models::RawDocument;
use signet_core::{SignetConfig, SignetError};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use super::aggregate::{self, EntityRegistry};
use super::extract;
use super::store;

/// Per-document outcome inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Stored {
        document_id: String,
        deduplicated: bool,
        claims_merged: usize,
        conflicts_flagged: usize,
    },
    /// Document persisted but nothing extractable; the extraction error is
    /// recorded, not fatal.
    StoredNoClaims {
        document_id: String,
        reason: String,
    },
    Failed {
        url: String,
        reason: String,
    },
}

/// Report for one ingestion batch. Partial progress is the normal case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub claims_merged: usize,
    pub conflicts_flagged: usize,
    pub aborted: bool,
    pub outcomes: Vec<DocumentOutcome>,
}

/// Ingest a batch of raw documents. `shutdown` aborts between documents.
pub async fn ingest_batch(
    pool: &SqlitePool,
    registry: &EntityRegistry,
    config: &SignetConfig,
    documents: &[RawDocument],
    mut shutdown: Option<broadcast::Receiver<()>>,
) -> BatchReport {
    let mut report = BatchReport::default();

    for raw in documents {
        if let Some(rx) = shutdown.as_mut() {
            // A pending signal (even a lagged one) means stop cleanly here.
            if !matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
                tracing::info!(
                    "Batch ingestion aborted after {} documents",
                    report.documents_processed
                );
                report.aborted = true;
                break;
            }
        }

        match process_document(pool, registry, config, raw).await {
            Ok(outcome) => {
                report.documents_processed += 1;
                if let DocumentOutcome::Stored {
                    claims_merged,
                    conflicts_flagged,
                    ..
                } = &outcome
                {
                    report.claims_merged += claims_merged;
                    report.conflicts_flagged += conflicts_flagged;
                }
                report.outcomes.push(outcome);
            }
            Err(e) => {
                tracing::warn!(url = %raw.url, error = %e, "Document ingestion failed");
                report.documents_failed += 1;
                report.outcomes.push(DocumentOutcome::Failed {
                    url: raw.url.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

async fn process_document(
    pool: &SqlitePool,
    registry: &EntityRegistry,
    config: &SignetConfig,
    raw: &RawDocument,
) -> anyhow::Result<DocumentOutcome> {
    let put = store::put(pool, raw, &config.database).await?;

    let claims = match extract::extract(&put.document, &config.extraction) {
        Ok(claims) => claims,
        Err(SignetError::Ingest(reason)) => {
            // Recovered locally: the document stays stored, the batch goes on.
            tracing::warn!(
                document_id = %put.document.id,
                reason = %reason,
                "Extraction produced no claims"
            );
            return Ok(DocumentOutcome::StoredNoClaims {
                document_id: put.document.id.clone(),
                reason,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let merge = aggregate::merge_document_claims(
        pool,
        registry,
        &put.document,
        &claims,
        &config.aggregation,
    )
    .await?;

    Ok(DocumentOutcome::Stored {
        document_id: put.document.id.clone(),
        deduplicated: put.deduplicated,
        claims_merged: merge.claims_inserted,
        conflicts_flagged: merge.conflicts_flagged,
    })
}

// ============================================================================
// TESTS
// ============================================================================
