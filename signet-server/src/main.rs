use std::sync::Arc;

use clap::Parser;
use signet_core::SignetConfig;
use signet_ingest::{Collector, JsonlCollector};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use signet_server::http::HttpState;
use signet_server::server;
use signet_server::subsystems::aggregate::EntityRegistry;
use signet_server::subsystems::{ingest, score};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "signet.toml")]
    config: String,

    #[arg(long)]
    health: bool,

    /// Ingest a JSONL document dump, print the batch report, and exit
    #[arg(long)]
    ingest: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match SignetConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Open DB and make sure the schema exists
    let pool = match signet_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };
    signet_core::db::init_schema(&pool).await?;

    if args.health {
        match signet_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Signet DB health check passed");
        return Ok(());
    }

    let registry = Arc::new(EntityRegistry::new());

    // One-shot offline ingestion path
    if let Some(path) = args.ingest {
        let mut collector = JsonlCollector::new(&path);
        let documents = collector.collect().await?;
        tracing::info!("Collected {} documents from {}", documents.len(), path.display());

        let report = ingest::ingest_batch(&pool, &registry, &config, &documents, None).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Shutdown broadcast
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Background scoring sweep loop
    let scoring_pool = pool.clone();
    let scoring_config = config.scoring.clone();
    let scoring_shutdown = tx.subscribe();
    tokio::spawn(async move {
        score::run_scoring_loop(scoring_pool, scoring_config, scoring_shutdown).await;
    });

    // HTTP REST API server, if enabled
    if config.http.enabled {
        let state = Arc::new(HttpState {
            pool: pool.clone(),
            config: config.clone(),
            registry: registry.clone(),
            shutdown_tx: tx.clone(),
        });
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = signet_server::http::start_http_server(state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, pool, registry, config, tx).await?;

    Ok(())
}
