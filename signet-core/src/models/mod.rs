pub mod claim;
pub mod document;
pub mod entity;
pub mod score;

pub use claim::{Claim, Timeline};
pub use document::{content_hash, Document, RawDocument};
pub use entity::Entity;
pub use score::ScorePoint;
