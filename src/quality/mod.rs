//! Data-quality surface
//!
//! Read-only composition of the live components into one summary:
//! provider budget pressure, scheduler tick health and signature
//! freshness per feed. Summaries never mutate the components they read,
//! so polling this surface is always safe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::guard::ProviderBudgetGuard;
use crate::lineage::SignatureLedger;
use crate::registry::FeedCatalog;
use crate::scheduler::{SchedulerHealth, TickOutcome};
use crate::types::HealthStatus;

/// Default staleness bound for signatures, in milliseconds
pub const DEFAULT_FRESHNESS_MS: i64 = 180_000;
/// Default fraction of the budget that counts as "near the limit"
pub const DEFAULT_NEAR_LIMIT_RATIO: f64 = 0.85;
/// Default consecutive failures before the scheduler is critical
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

const CRITICAL_PENALTY: f64 = 25.0;
const WARNING_PENALTY: f64 = 10.0;

/// Tunable bounds for summary classification
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    /// A signature older than this is stale
    pub signature_freshness_ms: i64,
    /// Budget usage at or above this fraction is a warning
    pub near_limit_ratio: f64,
    /// Consecutive tick failures at or above this are critical
    pub max_consecutive_failures: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            signature_freshness_ms: DEFAULT_FRESHNESS_MS,
            near_limit_ratio: DEFAULT_NEAR_LIMIT_RATIO,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// One provider's budget pressure
#[derive(Debug, Clone, Serialize)]
pub struct ProviderBudgetRow {
    pub provider: String,
    pub calls: u32,
    pub limit: u32,
    pub remaining: u32,
    pub status: HealthStatus,
}

/// Scheduler tick health
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerRow {
    pub status: HealthStatus,
    pub ticks_fired: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    pub consecutive_failures: u32,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
    pub last_error: Option<String>,
}

/// Signature freshness for one feed
#[derive(Debug, Clone, Serialize)]
pub struct FeedLineageRow {
    pub feed_id: String,
    pub signer: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub age_ms: Option<i64>,
    pub status: HealthStatus,
}

/// The whole picture at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct DataQualitySummary {
    pub generated_at: DateTime<Utc>,
    /// Worst status across all rows
    pub status: HealthStatus,
    /// 0-100, starts at 100 and drops per issue
    pub quality_score: f64,
    /// Human-readable reasons behind the deductions
    pub issues: Vec<String>,
    pub providers: Vec<ProviderBudgetRow>,
    pub scheduler: SchedulerRow,
    pub feeds: Vec<FeedLineageRow>,
}

/// Read-only view over the ingest components
pub struct DataQualitySurface {
    guard: Arc<ProviderBudgetGuard>,
    health: Arc<SchedulerHealth>,
    ledger: Arc<SignatureLedger>,
    catalog: Arc<FeedCatalog>,
    thresholds: QualityThresholds,
}

impl DataQualitySurface {
    pub fn new(
        guard: Arc<ProviderBudgetGuard>,
        health: Arc<SchedulerHealth>,
        ledger: Arc<SignatureLedger>,
        catalog: Arc<FeedCatalog>,
        thresholds: QualityThresholds,
    ) -> Self {
        DataQualitySurface {
            guard,
            health,
            ledger,
            catalog,
            thresholds,
        }
    }

    /// Build a summary right now. `feed_filter` restricts the lineage
    /// rows to one feed; providers and scheduler always report globally.
    pub fn summarize(&self, feed_filter: Option<&str>) -> DataQualitySummary {
        let now = Utc::now();
        let mut issues = Vec::new();
        let mut score = 100.0_f64;
        let mut overall = HealthStatus::Healthy;

        let providers = self.provider_rows(&mut issues, &mut score, &mut overall);
        let scheduler = self.scheduler_row(&mut issues, &mut score, &mut overall);
        let feeds = self.feed_rows(now, feed_filter, &scheduler, &mut issues, &mut score, &mut overall);

        DataQualitySummary {
            generated_at: now,
            status: overall,
            quality_score: score.clamp(0.0, 100.0),
            issues,
            providers,
            scheduler,
            feeds,
        }
    }

    fn provider_rows(
        &self,
        issues: &mut Vec<String>,
        score: &mut f64,
        overall: &mut HealthStatus,
    ) -> Vec<ProviderBudgetRow> {
        self.guard
            .usage_all()
            .into_iter()
            .map(|usage| {
                let status = if usage.remaining == 0 {
                    issues.push(format!("provider '{}' budget exhausted", usage.provider));
                    *score -= CRITICAL_PENALTY;
                    HealthStatus::Critical
                } else if (usage.calls as f64)
                    >= (usage.limit as f64) * self.thresholds.near_limit_ratio
                {
                    issues.push(format!(
                        "provider '{}' near budget limit ({}/{})",
                        usage.provider, usage.calls, usage.limit
                    ));
                    *score -= WARNING_PENALTY;
                    HealthStatus::Warning
                } else {
                    HealthStatus::Healthy
                };
                *overall = overall.worst(status);
                ProviderBudgetRow {
                    provider: usage.provider,
                    calls: usage.calls,
                    limit: usage.limit,
                    remaining: usage.remaining,
                    status,
                }
            })
            .collect()
    }

    fn scheduler_row(
        &self,
        issues: &mut Vec<String>,
        score: &mut f64,
        overall: &mut HealthStatus,
    ) -> SchedulerRow {
        let snapshot = self.health.snapshot();

        let status = if snapshot.ticks_fired == 0 {
            HealthStatus::Unknown
        } else if snapshot.consecutive_failures >= self.thresholds.max_consecutive_failures {
            issues.push(format!(
                "scheduler failing repeatedly ({} consecutive failures)",
                snapshot.consecutive_failures
            ));
            *score -= CRITICAL_PENALTY;
            HealthStatus::Critical
        } else if snapshot.consecutive_failures > 0 {
            issues.push("last scheduler tick failed".to_string());
            *score -= WARNING_PENALTY;
            HealthStatus::Warning
        } else if snapshot.last_outcome == Some(TickOutcome::Skipped) {
            issues.push("last tick skipped, previous run still active".to_string());
            *score -= WARNING_PENALTY;
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };
        *overall = overall.worst(status);

        SchedulerRow {
            status,
            ticks_fired: snapshot.ticks_fired,
            successes: snapshot.successes,
            failures: snapshot.failures,
            skips: snapshot.skips,
            consecutive_failures: snapshot.consecutive_failures,
            last_tick_at: snapshot.last_tick_at,
            last_outcome: snapshot.last_outcome,
            last_error: snapshot.last_error,
        }
    }

    fn feed_rows(
        &self,
        now: DateTime<Utc>,
        feed_filter: Option<&str>,
        scheduler: &SchedulerRow,
        issues: &mut Vec<String>,
        score: &mut f64,
        overall: &mut HealthStatus,
    ) -> Vec<FeedLineageRow> {
        self.catalog
            .feeds()
            .iter()
            .filter(|feed| feed_filter.map(|f| feed.id == f).unwrap_or(true))
            .map(|feed| {
                let record = self.ledger.lookup(&feed.id);
                let (signer, signed_at, age_ms, status) = match record {
                    Some(record) => {
                        let age = now
                            .signed_duration_since(record.signed_at)
                            .num_milliseconds();
                        let status = if age > self.thresholds.signature_freshness_ms {
                            issues.push(format!(
                                "feed '{}' signature stale ({age} ms old)",
                                feed.id
                            ));
                            *score -= WARNING_PENALTY;
                            HealthStatus::Warning
                        } else {
                            HealthStatus::Healthy
                        };
                        (
                            Some(record.signer),
                            Some(record.signed_at),
                            Some(age),
                            status,
                        )
                    }
                    None if scheduler.ticks_fired == 0 => {
                        // Nothing has run yet, absence is expected.
                        (None, None, None, HealthStatus::Unknown)
                    }
                    None => {
                        issues.push(format!("feed '{}' has no recorded signature", feed.id));
                        *score -= WARNING_PENALTY;
                        (None, None, None, HealthStatus::Warning)
                    }
                };
                *overall = overall.worst(status);
                FeedLineageRow {
                    feed_id: feed.id.clone(),
                    signer,
                    signed_at,
                    age_ms,
                    status,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::BudgetGuardConfig;
    use crate::registry::FeedSpec;
    use std::collections::HashMap;

    fn one_feed_catalog() -> Arc<FeedCatalog> {
        Arc::new(
            FeedCatalog::new(vec![FeedSpec {
                id: "price/btc_usd".to_string(),
                providers: vec!["coingecko".to_string()],
                mock_value: 64_000.0,
            }])
            .unwrap(),
        )
    }

    fn surface(
        guard: Arc<ProviderBudgetGuard>,
        health: Arc<SchedulerHealth>,
        ledger: Arc<SignatureLedger>,
    ) -> DataQualitySurface {
        DataQualitySurface::new(
            guard,
            health,
            ledger,
            one_feed_catalog(),
            QualityThresholds::default(),
        )
    }

    #[test]
    fn idle_system_reports_unknown_not_failing() {
        let surface = surface(
            Arc::new(ProviderBudgetGuard::default()),
            Arc::new(SchedulerHealth::new()),
            Arc::new(SignatureLedger::new()),
        );

        let summary = surface.summarize(None);
        assert_eq!(summary.status, HealthStatus::Unknown);
        assert_eq!(summary.scheduler.status, HealthStatus::Unknown);
        assert_eq!(summary.feeds.len(), 1);
        assert_eq!(summary.feeds[0].status, HealthStatus::Unknown);
        assert!(summary.providers.is_empty());
        assert_eq!(summary.quality_score, 100.0);
        assert!(summary.issues.is_empty());
    }

    #[test]
    fn healthy_run_scores_full_marks() {
        let guard = Arc::new(ProviderBudgetGuard::default());
        guard.admit("coingecko");
        let health = Arc::new(SchedulerHealth::new());
        health.record_fired();
        health.record_success();
        let ledger = Arc::new(SignatureLedger::new());
        ledger.record("price/btc_usd", "oracle-core", "digest");

        let summary = surface(guard, health, ledger).summarize(None);
        assert_eq!(summary.status, HealthStatus::Healthy);
        assert_eq!(summary.quality_score, 100.0);
        assert_eq!(summary.providers.len(), 1);
        assert_eq!(summary.providers[0].status, HealthStatus::Healthy);
        assert_eq!(summary.feeds[0].status, HealthStatus::Healthy);
        assert_eq!(summary.feeds[0].signer.as_deref(), Some("oracle-core"));
    }

    #[test]
    fn exhausted_provider_is_critical_and_deducts() {
        let guard = Arc::new(ProviderBudgetGuard::new(BudgetGuardConfig {
            window_ms: 60_000,
            default_limit: 1,
            limits: HashMap::new(),
        }));
        guard.admit("coingecko");
        guard.admit("coingecko");

        let health = Arc::new(SchedulerHealth::new());
        health.record_fired();
        health.record_success();
        let ledger = Arc::new(SignatureLedger::new());
        ledger.record("price/btc_usd", "oracle-core", "digest");

        let summary = surface(guard, health, ledger).summarize(None);
        assert_eq!(summary.status, HealthStatus::Critical);
        assert_eq!(summary.providers[0].status, HealthStatus::Critical);
        assert!(summary.quality_score <= 75.0);
        assert!(summary
            .issues
            .iter()
            .any(|i| i.contains("budget exhausted")));
    }

    #[test]
    fn repeated_failures_make_the_scheduler_critical() {
        let health = Arc::new(SchedulerHealth::new());
        for _ in 0..3 {
            health.record_fired();
            health.record_failure("boom");
        }

        let summary = surface(
            Arc::new(ProviderBudgetGuard::default()),
            health,
            Arc::new(SignatureLedger::new()),
        )
        .summarize(None);

        assert_eq!(summary.scheduler.status, HealthStatus::Critical);
        assert_eq!(summary.scheduler.consecutive_failures, 3);
        // Ticks ran but the feed never got a signature.
        assert_eq!(summary.feeds[0].status, HealthStatus::Warning);
    }

    #[test]
    fn missing_signature_after_ticks_is_a_warning() {
        let health = Arc::new(SchedulerHealth::new());
        health.record_fired();
        health.record_success();

        let summary = surface(
            Arc::new(ProviderBudgetGuard::default()),
            health,
            Arc::new(SignatureLedger::new()),
        )
        .summarize(None);

        assert_eq!(summary.feeds[0].status, HealthStatus::Warning);
        assert!(summary
            .issues
            .iter()
            .any(|i| i.contains("no recorded signature")));
    }

    #[test]
    fn feed_filter_restricts_lineage_rows() {
        let catalog = Arc::new(
            FeedCatalog::new(vec![
                FeedSpec {
                    id: "price/btc_usd".to_string(),
                    providers: vec!["a".to_string()],
                    mock_value: 1.0,
                },
                FeedSpec {
                    id: "price/eth_usd".to_string(),
                    providers: vec!["a".to_string()],
                    mock_value: 1.0,
                },
            ])
            .unwrap(),
        );
        let surface = DataQualitySurface::new(
            Arc::new(ProviderBudgetGuard::default()),
            Arc::new(SchedulerHealth::new()),
            Arc::new(SignatureLedger::new()),
            catalog,
            QualityThresholds::default(),
        );

        let summary = surface.summarize(Some("price/eth_usd"));
        assert_eq!(summary.feeds.len(), 1);
        assert_eq!(summary.feeds[0].feed_id, "price/eth_usd");
    }

    #[test]
    fn summarize_does_not_mutate_components() {
        let guard = Arc::new(ProviderBudgetGuard::default());
        guard.admit("coingecko");
        let ledger = Arc::new(SignatureLedger::new());
        ledger.record("price/btc_usd", "s", "d");
        let health = Arc::new(SchedulerHealth::new());
        health.record_fired();
        health.record_success();

        let surface = surface(guard.clone(), health.clone(), ledger.clone());
        let first = surface.summarize(None);
        let second = surface.summarize(None);

        assert_eq!(guard.usage("coingecko").calls, 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(health.snapshot().ticks_fired, 1);
        assert_eq!(first.providers[0].calls, second.providers[0].calls);
        assert_eq!(first.quality_score, second.quality_score);
    }
}
