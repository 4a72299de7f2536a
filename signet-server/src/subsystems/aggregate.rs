//! Aggregation — resolves claim subjects to canonical entities and merges
//! claims into per-entity timelines.
//!
//! Timelines are derived on read (ordered by asserted date, ties broken by
//! document retrieval recency); this module owns the writes: entity
//! resolution via normalized alias lookup, claim insertion, and conflict
//! detection. Contradictory claims are kept and flagged, never discarded —
//! resolution is scoring's responsibility.
//!
//! All mutations for one document happen in one transaction, serialized
//! through the registry's single-writer lock so alias resolution stays
//! serializable.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use shellexpand::tilde;
use signet_core::config::AggregationConfig;
use signet_core::models::Document;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::extract::ExtractedClaim;

/// Serializes entity-registry writes. Alias resolution and claim insertion
/// for a document run under this lock, one writer at a time.
pub struct EntityRegistry {
    write_lock: Mutex<()>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            write_lock: Mutex::new(()),
        }
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Report from merging one document's claims.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub claims_inserted: usize,
    pub claims_already_known: usize,
    pub entities_created: usize,
    pub conflicts_flagged: usize,
}

/// Merge extracted claims into the entity timelines, atomically per
/// document.
pub async fn merge_document_claims(
    pool: &SqlitePool,
    registry: &EntityRegistry,
    document: &Document,
    claims: &[ExtractedClaim],
    config: &AggregationConfig,
) -> Result<MergeReport> {
    let _guard = registry.write_lock.lock().await;

    let mut report = MergeReport::default();
    let mut inbox_entries = Vec::new();

    let mut tx = pool.begin().await?;

    for claim in claims {
        let resolution =
            resolve_or_create(&mut tx, &claim.subject_entity, &claim.subject_kind, config).await?;
        if resolution.created {
            report.entities_created += 1;
        }

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO claims
                (id, document_id, entity_id, subject_entity, predicate, object_value,
                 confidence, asserted_date, conflicting)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
            "#,
        )
        .bind(claim.id)
        .bind(&document.id)
        .bind(resolution.entity_id)
        .bind(&claim.subject_entity)
        .bind(&claim.predicate)
        .bind(&claim.object_value)
        .bind(claim.confidence)
        .bind(claim.asserted_date)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            report.claims_already_known += 1;
            continue;
        }
        report.claims_inserted += 1;

        let conflicts = find_conflicts(&mut tx, resolution.entity_id, claim, config).await?;
        if !conflicts.is_empty() {
            let mut to_flag: Vec<Uuid> = conflicts.clone();
            to_flag.push(claim.id);
            for id in &to_flag {
                sqlx::query("UPDATE claims SET conflicting = 1 WHERE id = ?1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            report.conflicts_flagged += conflicts.len();
            inbox_entries.push(InboxEntry {
                subject: claim.subject_entity.clone(),
                predicate: claim.predicate.clone(),
                new_object: claim.object_value.clone(),
                new_claim: claim.id,
                existing: conflicts,
            });
        }
    }

    tx.commit().await?;

    for entry in &inbox_entries {
        if let Err(e) = write_to_review_inbox(entry, config) {
            tracing::warn!("Failed to write conflict to review inbox: {}", e);
        }
    }

    Ok(report)
}

struct Resolution {
    entity_id: Uuid,
    created: bool,
}

/// Resolve a subject to an entity via normalized alias lookup. Below the
/// similarity threshold a new entity is created — ambiguity never blocks
/// ingestion.
async fn resolve_or_create(
    tx: &mut Transaction<'_, Sqlite>,
    subject: &str,
    kind: &str,
    config: &AggregationConfig,
) -> Result<Resolution> {
    let alias = normalize_alias(subject);

    let exact: Option<(Uuid,)> =
        sqlx::query_as("SELECT entity_id FROM entity_aliases WHERE alias = ?1")
            .bind(&alias)
            .fetch_optional(&mut **tx)
            .await?;
    if let Some((entity_id,)) = exact {
        return Ok(Resolution {
            entity_id,
            created: false,
        });
    }

    if config.similarity_threshold < 1.0 {
        let known: Vec<(String, Uuid)> =
            sqlx::query_as("SELECT alias, entity_id FROM entity_aliases ORDER BY alias")
                .fetch_all(&mut **tx)
                .await?;

        let best = known
            .iter()
            .map(|(known_alias, id)| (alias_similarity(&alias, known_alias), *id))
            .filter(|(sim, _)| *sim >= config.similarity_threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((_, entity_id)) = best {
            // Learn the new surface form for this entity.
            sqlx::query("INSERT OR IGNORE INTO entity_aliases (alias, entity_id) VALUES (?1, ?2)")
                .bind(&alias)
                .bind(entity_id)
                .execute(&mut **tx)
                .await?;
            return Ok(Resolution {
                entity_id,
                created: false,
            });
        }
    }

    let entity_id = Uuid::new_v4();
    sqlx::query("INSERT INTO entities (id, canonical_name, kind) VALUES (?1, ?2, ?3)")
        .bind(entity_id)
        .bind(subject)
        .bind(kind)
        .execute(&mut **tx)
        .await?;
    sqlx::query("INSERT INTO entity_aliases (alias, entity_id) VALUES (?1, ?2)")
        .bind(&alias)
        .bind(entity_id)
        .execute(&mut **tx)
        .await?;

    Ok(Resolution {
        entity_id,
        created: true,
    })
}

/// Existing claims that contradict the new one: same entity and predicate,
/// incompatible object, asserted dates within the conflict window.
async fn find_conflicts(
    tx: &mut Transaction<'_, Sqlite>,
    entity_id: Uuid,
    claim: &ExtractedClaim,
    config: &AggregationConfig,
) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid, String, NaiveDate)> = sqlx::query_as(
        r#"
        SELECT id, object_value, asserted_date
        FROM claims
        WHERE entity_id = ?1 AND predicate = ?2 AND id != ?3
        "#,
    )
    .bind(entity_id)
    .bind(&claim.predicate)
    .bind(claim.id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .filter(|(_, object, date)| {
            !are_objects_compatible(object, &claim.object_value)
                && dates_overlap(*date, claim.asserted_date, config.conflict_window_days)
        })
        .map(|(id, _, _)| id)
        .collect())
}

/// Case/whitespace-normalized alias form. Idempotent.
pub fn normalize_alias(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set Jaccard similarity over normalized aliases.
fn alias_similarity(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// Objects are compatible when one contains the other (case-insensitive).
fn are_objects_compatible(obj1: &str, obj2: &str) -> bool {
    let o1 = obj1.to_lowercase();
    let o2 = obj2.to_lowercase();
    o1.contains(&o2) || o2.contains(&o1)
}

fn dates_overlap(d1: NaiveDate, d2: NaiveDate, window_days: i64) -> bool {
    (d1 - d2).num_days().abs() <= window_days
}

struct InboxEntry {
    subject: String,
    predicate: String,
    new_object: String,
    new_claim: Uuid,
    existing: Vec<Uuid>,
}

fn write_to_review_inbox(entry: &InboxEntry, config: &AggregationConfig) -> Result<()> {
    let expanded_path = tilde(&config.review_inbox).to_string();

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let existing: Vec<String> = entry.existing.iter().map(|id| id.to_string()).collect();
    let text = format!(
        r#"
### [{}] Claim Conflict
**Subject:** {} / **Predicate:** {}
**New claim:** {} ("{}")
**Conflicts with:** {}
Both claims kept and flagged; scoring reports the dispersion.

"#,
        Utc::now().to_rfc3339(),
        entry.subject,
        entry.predicate,
        entry.new_claim,
        entry.new_object,
        existing.join(", ")
    );

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)?;
    file.write_all(text.as_bytes())?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use signet_core::models::content_hash;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory sqlite");
        signet_core::db::init_schema(&pool)
            .await
            .expect("Failed to init schema");
        pool
    }

    fn test_config(inbox: &std::path::Path) -> AggregationConfig {
        AggregationConfig {
            similarity_threshold: 1.0,
            conflict_window_days: 30,
            review_inbox: inbox.to_string_lossy().into_owned(),
        }
    }

    async fn store_document(pool: &SqlitePool, text: &str) -> Document {
        let doc = Document {
            id: content_hash(text.as_bytes()),
            source: "arxiv".to_string(),
            urls: vec!["https://a.example/1".to_string()],
            retrieved_at: "2024-06-01T00:00:00Z".parse().unwrap(),
            raw_text: text.to_string(),
            language: "en".to_string(),
        };
        sqlx::query(
            "INSERT INTO documents (id, source, urls, retrieved_at, raw_text, language) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&doc.id)
        .bind(&doc.source)
        .bind(serde_json::to_string(&doc.urls).unwrap())
        .bind(doc.retrieved_at)
        .bind(&doc.raw_text)
        .bind(&doc.language)
        .execute(pool)
        .await
        .unwrap();
        doc
    }

    fn claim(subject: &str, predicate: &str, object: &str, date: &str) -> ExtractedClaim {
        let asserted_date: NaiveDate = date.parse().unwrap();
        ExtractedClaim {
            id: Uuid::new_v5(
                &Uuid::NAMESPACE_OID,
                format!("test|{}|{}|{}|{}", subject, predicate, object, date).as_bytes(),
            ),
            subject_entity: subject.to_string(),
            subject_kind: "technique".to_string(),
            predicate: predicate.to_string(),
            object_value: object.to_string(),
            confidence: 0.8,
            asserted_date,
        }
    }

    #[test]
    fn test_normalize_alias_idempotent() {
        let once = normalize_alias("  Multi-Agent   PPO ");
        let twice = normalize_alias(&once);
        assert_eq!(once, "multi-agent ppo");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_alias_similarity() {
        assert_eq!(alias_similarity("coop guide", "coop guide"), 1.0);
        assert!(alias_similarity("multi-agent ppo", "multi-agent ppo controller") > 0.6);
        assert_eq!(alias_similarity("alpha", "beta"), 0.0);
    }

    #[test]
    fn test_objects_compatible() {
        assert!(are_objects_compatible("coastal trials", "trials"));
        assert!(are_objects_compatible("trials", "coastal trials"));
        assert!(!are_objects_compatible("northern range", "southern range"));
        // An empty object contradicts nothing
        assert!(are_objects_compatible("", "anything"));
    }

    #[test]
    fn test_dates_overlap_window() {
        let a: NaiveDate = "2023-01-10".parse().unwrap();
        let b: NaiveDate = "2023-02-05".parse().unwrap();
        let c: NaiveDate = "2024-01-10".parse().unwrap();
        assert!(dates_overlap(a, b, 30));
        assert!(!dates_overlap(a, c, 30));
    }

    #[tokio::test]
    async fn test_merge_creates_and_reuses_entity() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("inbox.md"));

        let doc = store_document(&pool, "doc one").await;
        let report = merge_document_claims(
            &pool,
            &registry,
            &doc,
            &[
                claim("TechniqueX", "deployed", "", "2023-01-01"),
                claim("TechniqueX", "tested", "northern range", "2022-10-01"),
            ],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(report.claims_inserted, 2);
        assert_eq!(report.entities_created, 1);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_merge_alias_lookup_is_case_insensitive() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("inbox.md"));

        let doc = store_document(&pool, "doc one").await;
        merge_document_claims(
            &pool,
            &registry,
            &doc,
            &[claim("TechniqueX", "deployed", "", "2023-01-01")],
            &config,
        )
        .await
        .unwrap();

        let doc2 = store_document(&pool, "doc two").await;
        let report = merge_document_claims(
            &pool,
            &registry,
            &doc2,
            &[claim("TECHNIQUEX", "tested", "", "2023-05-01")],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(report.entities_created, 0);
    }

    #[tokio::test]
    async fn test_merge_similarity_threshold_learns_alias() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&dir.path().join("inbox.md"));
        config.similarity_threshold = 0.6;

        let doc = store_document(&pool, "doc one").await;
        merge_document_claims(
            &pool,
            &registry,
            &doc,
            &[claim("Multi-Agent PPO", "simulated", "", "2023-01-01")],
            &config,
        )
        .await
        .unwrap();

        let doc2 = store_document(&pool, "doc two").await;
        let report = merge_document_claims(
            &pool,
            &registry,
            &doc2,
            &[claim("Multi-Agent PPO Controller", "tested", "", "2023-03-01")],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(report.entities_created, 0);

        // The new surface form is now a known alias
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entity_aliases")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_conflicting_claims_both_kept_and_flagged() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("inbox.md"));

        let doc_a = store_document(&pool, "doc a").await;
        merge_document_claims(
            &pool,
            &registry,
            &doc_a,
            &[claim("TechniqueX", "deployed", "northern range", "2023-01-10")],
            &config,
        )
        .await
        .unwrap();

        let doc_b = store_document(&pool, "doc b").await;
        let report = merge_document_claims(
            &pool,
            &registry,
            &doc_b,
            &[claim("TechniqueX", "deployed", "southern range", "2023-01-20")],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(report.conflicts_flagged, 1);

        // Both claims survive, both flagged
        let rows: Vec<(bool,)> = sqlx::query_as("SELECT conflicting FROM claims")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(conflicting,)| *conflicting));

        // Conflict recorded in the review inbox
        let inbox = std::fs::read_to_string(dir.path().join("inbox.md")).unwrap();
        assert!(inbox.contains("Claim Conflict"));
        assert!(inbox.contains("TechniqueX"));
    }

    #[tokio::test]
    async fn test_distant_dates_do_not_conflict() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("inbox.md"));

        let doc_a = store_document(&pool, "doc a").await;
        merge_document_claims(
            &pool,
            &registry,
            &doc_a,
            &[claim("TechniqueX", "deployed", "northern range", "2023-01-10")],
            &config,
        )
        .await
        .unwrap();

        let doc_b = store_document(&pool, "doc b").await;
        let report = merge_document_claims(
            &pool,
            &registry,
            &doc_b,
            &[claim("TechniqueX", "deployed", "southern range", "2024-01-10")],
            &config,
        )
        .await
        .unwrap();

        assert_eq!(report.conflicts_flagged, 0);
    }

    #[tokio::test]
    async fn test_remerge_skips_known_claims() {
        let pool = test_pool().await;
        let registry = EntityRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir.path().join("inbox.md"));

        let doc = store_document(&pool, "doc one").await;
        let claims = [claim("TechniqueX", "deployed", "", "2023-01-01")];

        let first = merge_document_claims(&pool, &registry, &doc, &claims, &config)
            .await
            .unwrap();
        let second = merge_document_claims(&pool, &registry, &doc, &claims, &config)
            .await
            .unwrap();

        assert_eq!(first.claims_inserted, 1);
        assert_eq!(second.claims_inserted, 0);
        assert_eq!(second.claims_already_known, 1);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM claims")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
