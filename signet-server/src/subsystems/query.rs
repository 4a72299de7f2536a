//! Query surface — the read-only interface the dashboard consumes.
//!
//! Exposes entity listings, per-entity timelines (claims ordered by
//! asserted date, ties broken by document retrieval recency) and score
//! series. No mutation path.

use chrono::NaiveDate;
use signet_core::models::{Claim, Entity, ScorePoint, Timeline};
use signet_core::SignetError;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::aggregate::normalize_alias;

/// Resolve an entity reference — UUID or canonical name / alias.
pub async fn resolve_entity_ref(pool: &SqlitePool, reference: &str) -> Result<Entity, SignetError> {
    if let Ok(id) = Uuid::parse_str(reference.trim()) {
        if let Some(entity) = fetch_entity(pool, id).await? {
            return Ok(entity);
        }
        return Err(SignetError::NotFound(format!("entity {}", reference)));
    }

    let alias = normalize_alias(reference);
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT entity_id FROM entity_aliases WHERE alias = ?1")
            .bind(&alias)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((id,)) => fetch_entity(pool, id)
            .await?
            .ok_or_else(|| SignetError::NotFound(format!("entity {}", reference))),
        None => Err(SignetError::NotFound(format!("entity {}", reference))),
    }
}

/// The ordered claim history for one entity.
pub async fn get_timeline(pool: &SqlitePool, reference: &str) -> Result<Timeline, SignetError> {
    let entity = resolve_entity_ref(pool, reference).await?;
    let claims = fetch_entity_claims(pool, entity.id).await?;
    Ok(Timeline { entity, claims })
}

/// Score series for an entity, optionally bounded, ordered by date.
pub async fn get_score_series(
    pool: &SqlitePool,
    reference: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<ScorePoint>, SignetError> {
    let entity = resolve_entity_ref(pool, reference).await?;

    let rows: Vec<(NaiveDate, f64, f64, String)> = sqlx::query_as(
        r#"
        SELECT as_of_date, value, dispersion, contributing_claim_ids
        FROM score_points
        WHERE entity_id = ?1
        ORDER BY as_of_date
        "#,
    )
    .bind(entity.id)
    .fetch_all(pool)
    .await?;

    let mut points = Vec::with_capacity(rows.len());
    for (as_of_date, value, dispersion, ids_json) in rows {
        if from.is_some_and(|f| as_of_date < f) || to.is_some_and(|t| as_of_date > t) {
            continue;
        }
        let ids: Vec<String> = serde_json::from_str(&ids_json)
            .map_err(|e| SignetError::Other(format!("decode contributing ids: {}", e)))?;
        let contributing_claim_ids = ids
            .iter()
            .map(|s| Uuid::parse_str(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SignetError::Other(format!("decode contributing ids: {}", e)))?;

        points.push(ScorePoint {
            entity_id: entity.id,
            as_of_date,
            value,
            dispersion,
            contributing_claim_ids,
        });
    }

    Ok(points)
}

/// All known entities with their aliases.
pub async fn list_entities(pool: &SqlitePool) -> Result<Vec<Entity>, SignetError> {
    let rows: Vec<(Uuid, String, String)> =
        sqlx::query_as("SELECT id, canonical_name, kind FROM entities ORDER BY canonical_name")
            .fetch_all(pool)
            .await?;

    let mut entities = Vec::with_capacity(rows.len());
    for (id, canonical_name, kind) in rows {
        entities.push(Entity {
            id,
            canonical_name,
            aliases: fetch_aliases(pool, id).await?,
            kind,
        });
    }
    Ok(entities)
}

/// Claims for one entity in timeline order: asserted date ascending, ties
/// broken by document retrieval recency (newer retrieval sorts later).
pub async fn fetch_entity_claims(
    pool: &SqlitePool,
    entity_id: Uuid,
) -> Result<Vec<Claim>, SignetError> {
    let claims = sqlx::query_as::<_, Claim>(
        r#"
        SELECT c.id, c.document_id, c.entity_id, c.subject_entity, c.predicate,
               c.object_value, c.confidence, c.asserted_date, c.conflicting
        FROM claims c
        JOIN documents d ON d.id = c.document_id
        WHERE c.entity_id = ?1
        ORDER BY c.asserted_date, d.retrieved_at, c.id
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok(claims)
}

async fn fetch_entity(pool: &SqlitePool, id: Uuid) -> Result<Option<Entity>, SignetError> {
    let row: Option<(Uuid, String, String)> =
        sqlx::query_as("SELECT id, canonical_name, kind FROM entities WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((id, canonical_name, kind)) => Ok(Some(Entity {
            id,
            canonical_name,
            aliases: fetch_aliases(pool, id).await?,
            kind,
        })),
        None => Ok(None),
    }
}

async fn fetch_aliases(pool: &SqlitePool, entity_id: Uuid) -> Result<Vec<String>, SignetError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT alias FROM entity_aliases WHERE entity_id = ?1 ORDER BY alias")
            .bind(entity_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(alias,)| alias).collect())
}

// ============================================================================
// TESTS
// ============================================================================
