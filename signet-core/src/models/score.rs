use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One computed, dated progress-score observation for an Entity.
/// Append-only: new observations produce new points, never edits, and the
/// store rejects appends that do not advance `as_of_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub entity_id: Uuid,
    pub as_of_date: NaiveDate,
    pub value: f64,
    /// Spread between the highest- and lowest-supported outcome among
    /// conflicting claims active at `as_of_date`; 0 when there is none.
    pub dispersion: f64,
    pub contributing_claim_ids: Vec<Uuid>,
}
