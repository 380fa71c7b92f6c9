//! Core types used throughout the oracle core
//!
//! Defines common data structures for samples, blended signals, budgets
//! and evidence references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blend weights for one feed: how much of the signal comes from live
/// provider data versus the deterministic mock baseline.
///
/// Weights are applied exactly as stored. Nothing renormalizes them, so
/// `{live: 0.7, mock: 0.3}` and `{live: 7.0, mock: 3.0}` are different
/// configurations on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPair {
    /// Multiplier for the live sample
    pub live: f64,
    /// Multiplier for the mock sample
    pub mock: f64,
}

impl WeightPair {
    /// Fallback used for feeds with no configured weights
    pub const MOCK_ONLY: WeightPair = WeightPair {
        live: 0.0,
        mock: 1.0,
    };

    /// Sum of both weights
    pub fn total(&self) -> f64 {
        self.live + self.mock
    }
}

impl Default for WeightPair {
    fn default() -> Self {
        WeightPair::MOCK_ONLY
    }
}

impl fmt::Display for WeightPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "live={:.3} mock={:.3}", self.live, self.mock)
    }
}

/// Pointer to the upstream material a sample was derived from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Upstream source identifier (e.g. "coingecko", "mock")
    pub source_id: String,
    /// URL the payload was fetched from, when one exists
    pub url: Option<String>,
    /// sha256 hex digest of the raw upstream payload
    pub content_hash: Option<String>,
    /// When the payload was captured
    pub captured_at: DateTime<Utc>,
}

impl EvidenceRef {
    /// Evidence for material with no retrievable URL or payload
    pub fn opaque(source_id: impl Into<String>) -> Self {
        EvidenceRef {
            source_id: source_id.into(),
            url: None,
            content_hash: None,
            captured_at: Utc::now(),
        }
    }
}

/// One raw reading obtained from a single upstream source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    /// Observed value
    pub value: f64,
    /// Relative weight of this source inside the live reduction
    pub weight: f64,
    /// Source-reported confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Evidence backing this reading
    pub evidence: Vec<EvidenceRef>,
}

/// Blended output for one feed after live and mock inputs are combined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Feed identifier, `namespace/name` (e.g. "price/btc_usd")
    pub feed_id: String,
    /// Blended value: `live * live_weight + mock * mock_weight`
    pub value: f64,
    /// Live weight that was applied
    pub live_weight: f64,
    /// Mock weight that was applied
    pub mock_weight: f64,
    /// When the blend was computed
    pub computed_at: DateTime<Utc>,
}

/// Snapshot of one provider's call budget inside the current window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUsage {
    /// Provider name
    pub provider: String,
    /// Calls admitted in the current window
    pub calls: u32,
    /// Maximum calls per window
    pub limit: u32,
    /// Calls left before the provider is throttled
    pub remaining: u32,
}

/// Coarse health classification used across the quality surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    /// Not enough data to judge (e.g. before the first tick)
    Unknown,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Unknown
    }
}

impl HealthStatus {
    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::Warning => 2,
            HealthStatus::Critical => 3,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}
