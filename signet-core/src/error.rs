use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignetError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Storage retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: usize, last: String },

    #[error("Score point is not newer than the entity's last recorded point: {0}")]
    StaleScorePoint(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Other error: {0}")]
    Other(String),
}
