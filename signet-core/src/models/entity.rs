use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A canonical real-world subject (technique, organization) that claims
/// refer to. Aliases are stored normalized; resolving the canonical name is
/// always a no-op because it is itself an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub kind: String,
}
