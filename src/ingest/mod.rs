//! Ingest pipeline
//!
//! One cycle walks every feed in the catalog: budget-guarded live
//! fetches, robust reduction, live/mock blend, validation, signing claim,
//! namespace version bump, optional persistence. A feed whose providers
//! all fail degrades to its mock side; only validation can withhold a
//! signal entirely.

pub mod providers;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::consensus::robust::{weighted_median, WeightedSample};
use crate::consensus::validate::validate_result;
use crate::consensus::ConsensusAggregator;
use crate::guard::ProviderBudgetGuard;
use crate::lineage::{content_digest, SignatureLedger};
use crate::persistence::{ObjectStore, SignalHistory, StorePointer};
use crate::registry::{namespace_of, FeedCatalog, FeedSpec, VersionRegistry};
use crate::scheduler::{job_fn, single_flight, JobFn};
use crate::types::{ConsensusResult, RawSample};

use providers::{ProviderRegistry, SampleProvider};

/// What one ingest cycle accomplished
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Feeds visited
    pub feeds: usize,
    /// Signals produced, signed and versioned
    pub produced: Vec<ConsensusResult>,
    /// Feeds whose blend failed validation
    pub withheld: usize,
    pub elapsed_ms: u64,
}

/// The recurring ingest job.
///
/// Owns no mutable state of its own; all shared components sit behind
/// `Arc` so the job can be cloned into the scheduler while the quality
/// surface reads the same instances.
pub struct IngestJob {
    catalog: Arc<FeedCatalog>,
    guard: Arc<ProviderBudgetGuard>,
    providers: Arc<ProviderRegistry>,
    mock: Arc<dyn SampleProvider>,
    aggregator: ConsensusAggregator,
    ledger: Arc<SignatureLedger>,
    registry: Arc<VersionRegistry>,
    signer: String,
    history: Option<Arc<SignalHistory>>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl IngestJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<FeedCatalog>,
        guard: Arc<ProviderBudgetGuard>,
        providers: Arc<ProviderRegistry>,
        mock: Arc<dyn SampleProvider>,
        aggregator: ConsensusAggregator,
        ledger: Arc<SignatureLedger>,
        registry: Arc<VersionRegistry>,
        signer: impl Into<String>,
    ) -> Self {
        IngestJob {
            catalog,
            guard,
            providers,
            mock,
            aggregator,
            ledger,
            registry,
            signer: signer.into(),
            history: None,
            store: None,
        }
    }

    /// Append every produced signal to the CSV history
    pub fn with_history(mut self, history: Arc<SignalHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Keep the latest signal payload per feed in an object store
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run one full cycle over the catalog. Feeds are processed
    /// concurrently; each feed's providers are queried in declaration
    /// order so budget admission stays deterministic per feed.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let started = Instant::now();

        if self.catalog.is_empty() {
            debug!(%cycle_id, "no feeds configured, nothing to ingest");
            return Ok(CycleReport {
                cycle_id,
                feeds: 0,
                produced: Vec::new(),
                withheld: 0,
                elapsed_ms: 0,
            });
        }

        let outcomes = join_all(
            self.catalog
                .feeds()
                .iter()
                .map(|feed| self.process_feed(cycle_id, feed)),
        )
        .await;

        let feeds = outcomes.len();
        let produced: Vec<ConsensusResult> = outcomes.into_iter().flatten().collect();
        let withheld = feeds - produced.len();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            %cycle_id,
            feeds,
            produced = produced.len(),
            withheld,
            elapsed_ms,
            "ingest cycle complete"
        );

        Ok(CycleReport {
            cycle_id,
            feeds,
            produced,
            withheld,
            elapsed_ms,
        })
    }

    async fn process_feed(&self, cycle_id: Uuid, feed: &FeedSpec) -> Option<ConsensusResult> {
        let live_samples = self.collect_live_samples(cycle_id, feed).await;

        let reducible: Vec<WeightedSample> = live_samples
            .iter()
            // Source confidence scales its declared weight.
            .map(|s| WeightedSample::new(s.value, s.weight * s.confidence))
            .collect();
        let live = weighted_median(&reducible);

        let mock_sample = match self.mock.fetch(feed).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(
                    %cycle_id,
                    feed = %feed.id,
                    error = %e,
                    "mock provider failed, using catalog baseline"
                );
                RawSample {
                    value: feed.mock_value,
                    weight: 1.0,
                    confidence: 0.5,
                    evidence: Vec::new(),
                }
            }
        };

        let result = self.aggregator.blend(&feed.id, live, mock_sample.value);

        let evidence_count = live_samples.iter().map(|s| s.evidence.len()).sum::<usize>()
            + mock_sample.evidence.len();
        let report = validate_result(&result, evidence_count);
        if !report.is_valid() {
            warn!(
                %cycle_id,
                feed = %feed.id,
                issues = ?report.issues,
                "blend failed validation, signal withheld"
            );
            return None;
        }

        let digest = content_digest(&result);
        self.ledger.record(&feed.id, &self.signer, &digest);
        let version = self.registry.bump(namespace_of(&feed.id));

        debug!(
            %cycle_id,
            feed = %feed.id,
            value = result.value,
            live = ?live,
            mock = mock_sample.value,
            version,
            "signal blended and signed"
        );

        if let Some(history) = &self.history {
            if let Err(e) = history.save_signal(&result, live.is_some()).await {
                warn!(%cycle_id, feed = %feed.id, error = %e, "failed to append signal history");
            }
        }
        if let Some(store) = &self.store {
            match serde_json::to_vec(&result) {
                Ok(payload) => {
                    let pointer = StorePointer::new("signals", format!("{}/latest", feed.id));
                    if let Err(e) = store.put(&pointer, payload).await {
                        warn!(%cycle_id, feed = %feed.id, error = %e, "failed to store latest signal");
                    }
                }
                Err(e) => {
                    warn!(%cycle_id, feed = %feed.id, error = %e, "failed to encode signal payload");
                }
            }
        }

        Some(result)
    }

    async fn collect_live_samples(&self, cycle_id: Uuid, feed: &FeedSpec) -> Vec<RawSample> {
        let mut samples = Vec::new();
        for name in &feed.providers {
            // The guard already logged the denial, just move on.
            if !self.guard.admit(name) {
                continue;
            }
            let Some(provider) = self.providers.resolve(name) else {
                warn!(
                    %cycle_id,
                    feed = %feed.id,
                    provider = %name,
                    "no provider registered under this name"
                );
                continue;
            };
            match provider.fetch(feed).await {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    warn!(
                        %cycle_id,
                        feed = %feed.id,
                        provider = %name,
                        error = %e,
                        "live sample fetch failed"
                    );
                }
            }
        }
        samples
    }

    /// Package this job for the scheduler with single-flight overlap
    /// control, so two cycles can never run at once.
    pub fn into_job(self: Arc<Self>) -> JobFn {
        let job = self;
        let run = job_fn(move || {
            let job = job.clone();
            async move { job.run_cycle().await.map(|_| ()) }
        });
        single_flight("ingest", run)
    }
}
