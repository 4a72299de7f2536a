//! signet-cli — thin HTTP frontend for the Signet pipeline server.
//!
//! # Subcommands
//! - `status`                          — server health
//! - `ingest <file.jsonl> [--json]`    — push an offline document dump
//! - `entities [--json]`               — list tracked entities
//! - `timeline <entity> [--json]`      — ordered claim history
//! - `scores <entity> [--from --to] [--json]` — score series
//! - `sweep`                           — trigger a scoring sweep

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "signet-cli",
    version,
    about = "Signet research-signal pipeline — HTTP CLI"
)]
struct Cli {
    /// Signet HTTP server URL (overrides SIGNET_HTTP_URL env var)
    #[arg(long, env = "SIGNET_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show server status
    Status,

    /// Ingest a JSONL document dump (one JSON object per line)
    Ingest {
        file: PathBuf,

        /// Print the raw batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tracked entities
    Entities {
        #[arg(long)]
        json: bool,
    },

    /// Show the ordered claim history for an entity (name or UUID)
    Timeline {
        entity: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the score series for an entity (name or UUID)
    Scores {
        entity: String,

        /// Inclusive lower bound, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper bound, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Trigger a scoring sweep now
    Sweep,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct EntitySummary {
    id: String,
    canonical_name: String,
    kind: String,
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    count: usize,
    entities: Vec<EntitySummary>,
}

#[derive(Debug, Deserialize)]
struct ClaimRow {
    predicate: String,
    object_value: String,
    confidence: f64,
    asserted_date: String,
    conflicting: bool,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    entity: EntitySummary,
    claims: Vec<ClaimRow>,
}

#[derive(Debug, Deserialize)]
struct ScorePointRow {
    as_of_date: String,
    value: f64,
    dispersion: f64,
}

#[derive(Debug, Deserialize)]
struct ScoresResponse {
    count: usize,
    points: Vec<ScorePointRow>,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::blocking::Client::new();

    match cli.command {
        Commands::Status => status(&client, &cli.server),
        Commands::Ingest { file, json } => ingest(&client, &cli.server, &file, json),
        Commands::Entities { json } => entities(&client, &cli.server, json),
        Commands::Timeline { entity, json } => timeline(&client, &cli.server, &entity, json),
        Commands::Scores {
            entity,
            from,
            to,
            json,
        } => scores(&client, &cli.server, &entity, from, to, json),
        Commands::Sweep => sweep(&client, &cli.server),
    }
}

fn status(client: &reqwest::blocking::Client, server: &str) -> anyhow::Result<()> {
    let body: serde_json::Value = client
        .get(format!("{}/health", server))
        .send()
        .with_context(|| format!("Failed to reach {}", server))?
        .json()?;

    println!("server:  {}", server);
    println!("status:  {}", body["status"].as_str().unwrap_or("unknown"));
    println!("version: {}", body["version"].as_str().unwrap_or("unknown"));
    println!("sqlite:  {}", body["sqlite"].as_str().unwrap_or("unknown"));
    Ok(())
}

fn ingest(
    client: &reqwest::blocking::Client,
    server: &str,
    file: &PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut documents = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(doc) => documents.push(doc),
            Err(e) => eprintln!("skipping malformed row {}: {}", idx + 1, e),
        }
    }
    if documents.is_empty() {
        bail!("no documents found in {}", file.display());
    }

    let response = client
        .post(format!("{}/ingest", server))
        .json(&documents)
        .send()
        .with_context(|| format!("Failed to reach {}", server))?;
    let body: serde_json::Value = response.json()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "processed {} documents ({} failed), {} claims merged, {} conflicts flagged",
        body["documents_processed"],
        body["documents_failed"],
        body["claims_merged"],
        body["conflicts_flagged"]
    );
    Ok(())
}

fn entities(client: &reqwest::blocking::Client, server: &str, json: bool) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/entities", server))
        .send()
        .with_context(|| format!("Failed to reach {}", server))?;

    if json {
        let body: serde_json::Value = response.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let body: EntitiesResponse = response.json()?;
    println!("{} entities", body.count);
    for entity in body.entities {
        println!(
            "  {}  {} [{}] ({} aliases)",
            entity.id,
            entity.canonical_name,
            entity.kind,
            entity.aliases.len()
        );
    }
    Ok(())
}

fn timeline(
    client: &reqwest::blocking::Client,
    server: &str,
    entity: &str,
    json: bool,
) -> anyhow::Result<()> {
    let response = client
        .get(format!("{}/entities/{}/timeline", server, entity))
        .send()
        .with_context(|| format!("Failed to reach {}", server))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        bail!("unknown entity: {}", entity);
    }

    if json {
        let body: serde_json::Value = response.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let body: TimelineResponse = response.json()?;
    println!(
        "{} [{}] — {} claims",
        body.entity.canonical_name,
        body.entity.kind,
        body.claims.len()
    );
    for claim in body.claims {
        let flag = if claim.conflicting { " (conflicting)" } else { "" };
        println!(
            "  {}  {} {}  conf={:.2}{}",
            claim.asserted_date, claim.predicate, claim.object_value, claim.confidence, flag
        );
    }
    Ok(())
}

fn scores(
    client: &reqwest::blocking::Client,
    server: &str,
    entity: &str,
    from: Option<String>,
    to: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut request = client.get(format!("{}/entities/{}/scores", server, entity));
    if let Some(from) = from {
        request = request.query(&[("from", from)]);
    }
    if let Some(to) = to {
        request = request.query(&[("to", to)]);
    }

    let response = request
        .send()
        .with_context(|| format!("Failed to reach {}", server))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        bail!("unknown entity: {}", entity);
    }

    if json {
        let body: serde_json::Value = response.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let body: ScoresResponse = response.json()?;
    println!("{} score points", body.count);
    for point in body.points {
        println!(
            "  {}  value={:.3}  dispersion={:.3}",
            point.as_of_date, point.value, point.dispersion
        );
    }
    Ok(())
}

fn sweep(client: &reqwest::blocking::Client, server: &str) -> anyhow::Result<()> {
    let body: serde_json::Value = client
        .post(format!("{}/sweep", server))
        .send()
        .with_context(|| format!("Failed to reach {}", server))?
        .json()?;

    println!(
        "scored {} entities, {} points appended, {} skipped",
        body["entities_scored"], body["points_appended"], body["points_skipped"]
    );
    Ok(())
}
