//! Oracle Core daemon
//!
//! Wires the catalog, budget guard, consensus aggregator, ledger and
//! registry together, then runs the ingest cycle and a periodic quality
//! report until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use oracle_core::config::AppConfig;
use oracle_core::consensus::{ConsensusAggregator, FileWeightSource, WeightSource};
use oracle_core::guard::{BudgetGuardConfig, ProviderBudgetGuard};
use oracle_core::ingest::providers::{HttpSampleProvider, MockSampleProvider, ProviderRegistry};
use oracle_core::ingest::IngestJob;
use oracle_core::lineage::SignatureLedger;
use oracle_core::persistence::{MemoryObjectStore, SignalHistory};
use oracle_core::quality::{DataQualitySurface, QualityThresholds};
use oracle_core::registry::{FeedCatalog, VersionRegistry};
use oracle_core::scheduler::{job_fn, IngestScheduler, JobFn, SchedulerHealth};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!(config = %config.digest(), "oracle core starting");

    let catalog = Arc::new(FeedCatalog::load_or_demo(&config.ingest.feeds_path));
    let weights: Arc<dyn WeightSource> =
        Arc::new(FileWeightSource::load(&config.ingest.weights_path));
    let guard = Arc::new(ProviderBudgetGuard::new(BudgetGuardConfig {
        window_ms: config.budget.window_ms,
        default_limit: config.budget.default_limit,
        limits: config.budget.limits.clone(),
    }));
    let ledger = Arc::new(SignatureLedger::new());
    let registry = Arc::new(VersionRegistry::new());

    let providers = Arc::new(build_provider_registry(&config, &catalog)?);
    let mock = Arc::new(MockSampleProvider::new(config.ingest.mock_seed));

    let mut job = IngestJob::new(
        catalog.clone(),
        guard.clone(),
        providers,
        mock,
        ConsensusAggregator::new(weights),
        ledger.clone(),
        registry.clone(),
        config.ingest.signer.clone(),
    );
    if config.persistence.csv_enabled {
        job = job.with_history(Arc::new(SignalHistory::new(&config.persistence.data_dir)?));
    }
    if config.persistence.store_latest {
        job = job.with_store(Arc::new(MemoryObjectStore::new()));
    }

    let ingest_health = Arc::new(SchedulerHealth::new());
    let ingest = IngestScheduler::new(
        "ingest",
        Arc::new(job).into_job(),
        Duration::from_millis(config.scheduler.interval_ms),
        ingest_health.clone(),
    );

    let quality = Arc::new(DataQualitySurface::new(
        guard.clone(),
        ingest_health,
        ledger.clone(),
        catalog,
        QualityThresholds {
            signature_freshness_ms: config.quality.signature_freshness_ms,
            near_limit_ratio: config.quality.near_limit_ratio,
            max_consecutive_failures: config.quality.max_consecutive_failures,
        },
    ));

    let report_health = Arc::new(SchedulerHealth::new());
    let reporter = IngestScheduler::new(
        "quality-report",
        quality_report_job(quality.clone()),
        Duration::from_millis(config.scheduler.report_interval_ms),
        report_health,
    );

    ingest.start();
    reporter.start();
    info!("oracle core running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    ingest.stop();
    reporter.stop();

    let summary = quality.summarize(None);
    info!(
        status = %summary.status,
        score = summary.quality_score,
        signals = ledger.len(),
        namespaces = registry.list_versions().len(),
        "oracle core stopped"
    );

    Ok(())
}

/// Wire providers for every name the catalog references: configured HTTP
/// endpoints first, mock stand-ins for the rest.
fn build_provider_registry(config: &AppConfig, catalog: &FeedCatalog) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for (name, endpoint) in &config.ingest.endpoints {
        let provider = HttpSampleProvider::new(name.clone(), &endpoint.url, &endpoint.value_path)?
            .with_weight(endpoint.weight);
        registry.register(name.clone(), Arc::new(provider));
        info!(provider = %name, url = %endpoint.url, "live endpoint registered");
    }

    for name in catalog.provider_names() {
        if registry.resolve(&name).is_none() {
            info!(provider = %name, "no live endpoint configured, using mock stand-in");
            registry.register(
                name.clone(),
                Arc::new(MockSampleProvider::for_source(
                    config.ingest.mock_seed,
                    &name,
                )),
            );
        }
    }

    Ok(registry)
}

fn quality_report_job(quality: Arc<DataQualitySurface>) -> JobFn {
    job_fn(move || {
        let quality = quality.clone();
        async move {
            let summary = quality.summarize(None);
            info!(
                status = %summary.status,
                score = summary.quality_score,
                providers = summary.providers.len(),
                feeds = summary.feeds.len(),
                issues = summary.issues.len(),
                "data quality report"
            );
            if !summary.issues.is_empty() {
                debug!(issues = ?summary.issues, "quality issues detail");
            }
            Ok(())
        }
    })
}
