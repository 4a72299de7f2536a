//! Collector adapters — the boundary between per-source collectors and the
//! pipeline core.
//!
//! A collector owns its source specifics (scheduling, rate limiting, auth)
//! and produces `RawDocument`s; the core consumes them through the document
//! store's `put`. This crate ships the trait and an offline JSONL dump
//! collector; network collectors live outside the core.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use signet_core::models::RawDocument;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Collector {
    /// Source label stamped into collected documents' provenance.
    fn source(&self) -> &str;

    /// Produce the next batch of raw documents.
    async fn collect(&mut self) -> Result<Vec<RawDocument>, CollectorError>;
}

/// Reads an offline dump: one JSON document object per line. Lines that do
/// not parse are logged and skipped — a bad row never aborts the batch.
/// Rows repeating an already-seen URL within the dump are dropped.
pub struct JsonlCollector {
    path: PathBuf,
}

impl JsonlCollector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Collector for JsonlCollector {
    fn source(&self) -> &str {
        "jsonl"
    }

    async fn collect(&mut self) -> Result<Vec<RawDocument>, CollectorError> {
        let content = tokio::fs::read_to_string(&self.path).await?;

        let mut documents = Vec::new();
        let mut seen_urls = HashSet::new();

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let document: RawDocument = match serde_json::from_str(line) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "Skipping malformed document row"
                    );
                    continue;
                }
            };
            if !seen_urls.insert(document.url.clone()) {
                tracing::debug!(url = %document.url, "Skipping duplicate URL within dump");
                continue;
            }
            documents.push(document);
        }

        Ok(documents)
    }
}

// ============================================================================
// TESTS
// ============================================================================
