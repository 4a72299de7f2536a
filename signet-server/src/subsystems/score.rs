//! Scoring — composite, time-decayed progress scores per entity.
//!
//! Weight of a claim at `as_of` = `confidence × 0.5^(age_days / half_life)`.
//! Each claim carries a maturity signal in [0,1] derived from its predicate
//! (theory → simulation → demonstration → field test → deployment); the
//! score value is the weight-normalized maturity over claims active as of
//! that date. Stale claims lose influence smoothly, they are never deleted.
//!
//! Conflicting claims contribute independently; the spread between the
//! highest- and lowest-supported contested outcome is reported as a
//! dispersion metric next to the value.
//!
//! `score_timeline` is pure (no clock, no DB), so re-scoring unchanged
//! inputs yields a bit-identical point. Appends are monotonic per entity:
//! `record` rejects a point that does not advance `as_of_date`.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use signet_core::config::ScoringConfig;
use signet_core::models::{Claim, ScorePoint};
use signet_core::SignetError;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::query;

/// Report from a scoring sweep.
#[derive(Debug, Clone, Default)]
pub struct ScoreSweepReport {
    pub entities_scored: usize,
    pub points_appended: usize,
    pub points_skipped: usize,
    pub elapsed_ms: u64,
}

/// Exponential decay with a configured half-life, in days.
pub fn decay(age_days: f64, half_life_days: f64) -> f64 {
    0.5_f64.powf(age_days / half_life_days)
}

/// Maturity signal per predicate, mirroring a five-stage rubric from pure
/// theory to operational deployment.
pub fn maturity_signal(predicate: &str) -> f64 {
    match predicate {
        "deployed" | "operational" => 1.0,
        "tested" => 0.8,
        "demonstrated" | "developed" => 0.6,
        "simulated" => 0.4,
        // published, referenced, and anything unrecognized: theory stage
        _ => 0.2,
    }
}

/// Score one entity's timeline as of a date. Pure function — no DB calls,
/// no wall clock. Returns `None` when no claim is active yet.
pub fn score_timeline(
    entity_id: Uuid,
    claims: &[Claim],
    as_of: NaiveDate,
    config: &ScoringConfig,
) -> Option<ScorePoint> {
    let active: Vec<&Claim> = claims.iter().filter(|c| c.asserted_date <= as_of).collect();
    if active.is_empty() {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut contributing = Vec::with_capacity(active.len());
    // Contested outcomes: (predicate, object) → accumulated weight
    let mut outcome_support: BTreeMap<(String, String), f64> = BTreeMap::new();

    for claim in &active {
        let age_days = (as_of - claim.asserted_date).num_days() as f64;
        let weight = claim.confidence * decay(age_days, config.half_life_days);

        weighted_sum += weight * maturity_signal(&claim.predicate);
        total_weight += weight;
        contributing.push(claim.id);

        if claim.conflicting {
            let key = (
                claim.predicate.clone(),
                claim.object_value.to_lowercase(),
            );
            *outcome_support.entry(key).or_default() += weight;
        }
    }

    if total_weight <= 0.0 {
        return None;
    }

    let dispersion = if outcome_support.len() >= 2 {
        let max = outcome_support.values().cloned().fold(f64::MIN, f64::max);
        let min = outcome_support.values().cloned().fold(f64::MAX, f64::min);
        (max - min) / total_weight
    } else {
        0.0
    };

    contributing.sort();

    Some(ScorePoint {
        entity_id,
        as_of_date: as_of,
        value: weighted_sum / total_weight,
        dispersion,
        contributing_claim_ids: contributing,
    })
}

/// Append a score point to the entity's series. Points never mutate; a
/// point that does not advance `as_of_date` is rejected.
pub async fn record(pool: &SqlitePool, point: &ScorePoint) -> Result<(), SignetError> {
    let last: Option<(NaiveDate,)> = sqlx::query_as(
        "SELECT as_of_date FROM score_points WHERE entity_id = ?1 ORDER BY as_of_date DESC LIMIT 1",
    )
    .bind(point.entity_id)
    .fetch_optional(pool)
    .await?;

    if let Some((last_date,)) = last {
        if point.as_of_date <= last_date {
            return Err(SignetError::StaleScorePoint(format!(
                "entity {} already scored as of {}",
                point.entity_id, last_date
            )));
        }
    }

    let ids: Vec<String> = point
        .contributing_claim_ids
        .iter()
        .map(|id| id.to_string())
        .collect();
    let ids_json = serde_json::to_string(&ids)
        .map_err(|e| SignetError::Other(format!("encode contributing ids: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO score_points (entity_id, as_of_date, value, dispersion, contributing_claim_ids)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(point.entity_id)
    .bind(point.as_of_date)
    .bind(point.value)
    .bind(point.dispersion)
    .bind(ids_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Score every entity with claims as of the given date, appending new
/// points. Entities whose series already covers the date are skipped.
pub async fn run_scoring_sweep(
    pool: &SqlitePool,
    config: &ScoringConfig,
    as_of: NaiveDate,
) -> Result<ScoreSweepReport> {
    let start = std::time::Instant::now();
    let mut report = ScoreSweepReport::default();

    let entity_ids: Vec<(Uuid,)> = sqlx::query_as("SELECT DISTINCT entity_id FROM claims")
        .fetch_all(pool)
        .await?;

    for (entity_id,) in entity_ids {
        let claims = query::fetch_entity_claims(pool, entity_id).await?;
        let Some(point) = score_timeline(entity_id, &claims, as_of, config) else {
            continue;
        };
        report.entities_scored += 1;

        match record(pool, &point).await {
            Ok(()) => report.points_appended += 1,
            Err(SignetError::StaleScorePoint(_)) => report.points_skipped += 1,
            Err(e) => return Err(e.into()),
        }
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Scoring sweep complete: {} entities, {} points appended, {} skipped in {}ms",
        report.entities_scored,
        report.points_appended,
        report.points_skipped,
        report.elapsed_ms
    );

    Ok(report)
}

/// Background scoring loop. Ticks on the configured interval, skips ticks
/// while the host is busy, stops on the shutdown signal.
pub async fn run_scoring_loop(
    pool: SqlitePool,
    config: ScoringConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(config.sweep_interval_minutes * 60);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Scoring loop started (interval: {}min)",
        config.sweep_interval_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !is_system_idle(&config) {
                    tracing::debug!("Scoring sweep skipped: system busy");
                    continue;
                }
                let as_of = Utc::now().date_naive();
                match run_scoring_sweep(&pool, &config, as_of).await {
                    Ok(report) => {
                        tracing::debug!(
                            "Sweep appended {} points across {} entities",
                            report.points_appended,
                            report.entities_scored
                        );
                    }
                    Err(e) => tracing::error!("Scoring sweep error: {}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Scoring loop shutting down");
                break;
            }
        }
    }
}

/// CPU load gate (Linux /proc/loadavg). Unknown hosts count as idle.
fn is_system_idle(config: &ScoringConfig) -> bool {
    if let Ok(load) = std::fs::read_to_string("/proc/loadavg") {
        if let Some(load_1m) = load.split_whitespace().next() {
            if let Ok(load_val) = load_1m.parse::<f32>() {
                let cpu_count = num_cpus::get() as f32;
                let cpu_percent = (load_val / cpu_count) * 100.0;
                if cpu_percent > config.cpu_threshold_percent as f32 {
                    return false;
                }
            }
        }
    }
    true
}

// ============================================================================
// TESTS
// ============================================================================
