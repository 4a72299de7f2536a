use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::RawDocument;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SignetRequest {
    Ping,
    Health,
    Ingest {
        documents: Vec<RawDocument>,
    },
    Entities,
    /// Entity id (UUID) or canonical name / alias.
    Timeline {
        entity: String,
    },
    Scores {
        entity: String,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Sweep,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignetResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub version: String,
}

impl SignetResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }
}
