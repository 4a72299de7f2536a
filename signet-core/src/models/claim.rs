use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::Entity;

/// A single structured assertion extracted from a Document. Owned by exactly
/// one Document; `conflicting` is set by aggregation when another claim with
/// the same predicate and an incompatible object overlaps in time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Claim {
    pub id: Uuid,
    pub document_id: String,
    pub entity_id: Uuid,
    pub subject_entity: String,
    pub predicate: String,
    pub object_value: String,
    pub confidence: f64,
    pub asserted_date: NaiveDate,
    pub conflicting: bool,
}

/// Ordered claim history for one Entity, derived on read: claims sorted by
/// `asserted_date`, ties broken by owning-document retrieval recency (newer
/// retrieval sorts later).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub entity: Entity,
    pub claims: Vec<Claim>,
}
