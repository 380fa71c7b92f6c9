//! Configuration management for the oracle core
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub budget: BudgetConfig,
    pub scheduler: SchedulerConfig,
    pub quality: QualityConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Signer identity recorded on every signature claim
    pub signer: String,
    /// Path to the feed catalog manifest
    pub feeds_path: String,
    /// Path to the blend weight manifest
    pub weights_path: String,
    /// Seed for the deterministic mock side
    pub mock_seed: u64,
    /// Live HTTP endpoints per provider name. Providers referenced by
    /// feeds but absent here run on mock stand-ins.
    #[serde(default)]
    pub endpoints: HashMap<String, HttpEndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpEndpointConfig {
    /// URL template; `{feed}` expands to the feed id
    pub url: String,
    /// Dotted path to the numeric value inside the JSON response
    pub value_path: String,
    /// Relative weight in the live reduction
    #[serde(default = "default_endpoint_weight")]
    pub weight: f64,
}

fn default_endpoint_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    /// Budget window length in milliseconds
    pub window_ms: i64,
    /// Calls per window for providers without an override
    pub default_limit: u32,
    /// Per-provider limit overrides
    #[serde(default)]
    pub limits: HashMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Ingest cycle cadence in milliseconds
    pub interval_ms: u64,
    /// Quality report cadence in milliseconds
    pub report_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    /// Signature age beyond which a feed counts as stale, milliseconds
    pub signature_freshness_ms: i64,
    /// Budget usage fraction that triggers a near-limit warning
    pub near_limit_ratio: f64,
    /// Consecutive tick failures before the scheduler is critical
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Enable CSV signal history
    pub csv_enabled: bool,
    /// Keep the latest signal payload per feed in the object store
    pub store_latest: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Ingest defaults
            .set_default("ingest.signer", "oracle-core")?
            .set_default("ingest.feeds_path", "registry/feeds.json")?
            .set_default("ingest.weights_path", "registry/weights.json")?
            .set_default("ingest.mock_seed", 101)?
            // Budget defaults
            .set_default("budget.window_ms", 60_000)?
            .set_default("budget.default_limit", 200)?
            // Scheduler defaults
            .set_default("scheduler.interval_ms", 60_000)?
            .set_default("scheduler.report_interval_ms", 30_000)?
            // Quality defaults
            .set_default("quality.signature_freshness_ms", 180_000)?
            .set_default("quality.near_limit_ratio", 0.85)?
            .set_default("quality.max_consecutive_failures", 3)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            .set_default("persistence.store_latest", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLE_*)
            .add_source(Environment::with_prefix("ORACLE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "signer={} feeds={} interval_ms={} window_ms={} limit={} endpoints={}",
            self.ingest.signer,
            self.ingest.feeds_path,
            self.scheduler.interval_ms,
            self.budget.window_ms,
            self.budget.default_limit,
            self.ingest.endpoints.len()
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
