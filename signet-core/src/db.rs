use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Schema statements, executed in order at startup. All idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id            TEXT PRIMARY KEY,
        source        TEXT NOT NULL,
        urls          TEXT NOT NULL,
        retrieved_at  TEXT NOT NULL,
        raw_text      TEXT NOT NULL,
        language      TEXT NOT NULL DEFAULT 'en'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        id             BLOB PRIMARY KEY,
        canonical_name TEXT NOT NULL,
        kind           TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entity_aliases (
        alias     TEXT PRIMARY KEY,
        entity_id BLOB NOT NULL REFERENCES entities(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS claims (
        id             BLOB PRIMARY KEY,
        document_id    TEXT NOT NULL REFERENCES documents(id),
        entity_id      BLOB NOT NULL REFERENCES entities(id),
        subject_entity TEXT NOT NULL,
        predicate      TEXT NOT NULL,
        object_value   TEXT NOT NULL,
        confidence     REAL NOT NULL,
        asserted_date  TEXT NOT NULL,
        conflicting    INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS claims_entity_date ON claims(entity_id, asserted_date)",
    r#"
    CREATE TABLE IF NOT EXISTS score_points (
        entity_id              BLOB NOT NULL REFERENCES entities(id),
        as_of_date             TEXT NOT NULL,
        value                  REAL NOT NULL,
        dispersion             REAL NOT NULL,
        contributing_claim_ids TEXT NOT NULL,
        PRIMARY KEY (entity_id, as_of_date)
    )
    "#,
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
