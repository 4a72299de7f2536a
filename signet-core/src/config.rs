use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct SignetConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Claims below this confidence are still emitted, only marked low-confidence.
    pub min_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// 1.0 = exact alias match only. Lower values enable token-overlap matching.
    pub similarity_threshold: f64,
    /// Two claims with the same predicate and incompatible objects conflict
    /// when their asserted dates are at most this many days apart.
    pub conflict_window_days: i64,
    pub review_inbox: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 1.0,
            conflict_window_days: 30,
            review_inbox: "~/.signet/review-inbox.md".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// A claim's influence halves every this many days.
    pub half_life_days: f64,
    pub sweep_interval_minutes: u64,
    pub cpu_threshold_percent: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_days: 180.0,
            sweep_interval_minutes: 60,
            cpu_threshold_percent: 80,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl SignetConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
