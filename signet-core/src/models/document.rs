use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One immutable ingested source artifact. `id` is the hex SHA-256 of the
/// raw bytes; identical content retrieved from different URLs collapses into
/// one Document whose `urls` set is the union.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub urls: Vec<String>,
    pub retrieved_at: DateTime<Utc>,
    pub raw_text: String,
    pub language: String,
}

/// A collector-produced document that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub retrieved_at: DateTime<Utc>,
    pub text: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl RawDocument {
    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// Hex SHA-256 over raw content bytes. The document store keys on this.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
