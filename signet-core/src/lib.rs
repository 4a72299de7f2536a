pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;

pub use config::SignetConfig;
pub use error::SignetError;
pub use models::{
    content_hash, Claim, Document, Entity, RawDocument, ScorePoint, Timeline,
};
