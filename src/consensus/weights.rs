//! Per-feed blend weight resolution
//!
//! Weight lookups never fail. A feed without configured weights resolves
//! to the mock-only pair, keeping unconfigured feeds on the safe path
//! instead of refusing to produce a signal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::types::WeightPair;

/// Resolution outcome for one feed's weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedWeights {
    /// The manifest carries an explicit pair for this feed
    Configured(WeightPair),
    /// No entry exists; the blend falls back to mock-only
    Unconfigured,
}

impl FeedWeights {
    /// The pair to apply, after fallback
    pub fn resolve(&self) -> WeightPair {
        match self {
            FeedWeights::Configured(pair) => *pair,
            FeedWeights::Unconfigured => WeightPair::MOCK_ONLY,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, FeedWeights::Configured(_))
    }
}

/// Source of per-feed blend weights
pub trait WeightSource: Send + Sync {
    fn weights(&self, feed_id: &str) -> FeedWeights;
}

/// Fixed in-memory weight table, mainly for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct StaticWeightSource {
    weights: HashMap<String, WeightPair>,
}

impl StaticWeightSource {
    pub fn new(weights: HashMap<String, WeightPair>) -> Self {
        StaticWeightSource { weights }
    }

    /// Empty table: every feed resolves as unconfigured
    pub fn empty() -> Self {
        StaticWeightSource::default()
    }

    pub fn set(mut self, feed_id: impl Into<String>, live: f64, mock: f64) -> Self {
        self.weights
            .insert(feed_id.into(), WeightPair { live, mock });
        self
    }
}

impl WeightSource for StaticWeightSource {
    fn weights(&self, feed_id: &str) -> FeedWeights {
        match self.weights.get(feed_id) {
            Some(pair) => FeedWeights::Configured(*pair),
            None => FeedWeights::Unconfigured,
        }
    }
}

/// Weight table loaded from a JSON manifest on disk.
///
/// An unreadable or malformed manifest degrades to an empty table, which
/// means every feed blends mock-only until the file is fixed. The raw
/// manifest bytes are digested so the active weight set can be traced.
#[derive(Debug)]
pub struct FileWeightSource {
    path: PathBuf,
    weights: HashMap<String, WeightPair>,
    checksum: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl FileWeightSource {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::read_manifest(&path) {
            Ok((weights, checksum)) => {
                info!(
                    path = %path.display(),
                    feeds = weights.len(),
                    checksum = %checksum,
                    "weight manifest loaded"
                );
                FileWeightSource {
                    path,
                    weights,
                    checksum: Some(checksum),
                    loaded_at: Some(Utc::now()),
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "weight manifest unreadable, all feeds fall back to mock-only"
                );
                FileWeightSource {
                    path,
                    weights: HashMap::new(),
                    checksum: None,
                    loaded_at: None,
                }
            }
        }
    }

    fn read_manifest(path: &Path) -> anyhow::Result<(HashMap<String, WeightPair>, String)> {
        use anyhow::Context;

        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read weight manifest {}", path.display()))?;
        let weights: HashMap<String, WeightPair> = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse weight manifest {}", path.display()))?;
        let checksum = hex::encode(Sha256::digest(&raw));
        Ok((weights, checksum))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// sha256 of the manifest bytes, if a manifest was loaded
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Number of feeds with explicit weights
    pub fn feed_count(&self) -> usize {
        self.weights.len()
    }
}

impl WeightSource for FileWeightSource {
    fn weights(&self, feed_id: &str) -> FeedWeights {
        match self.weights.get(feed_id) {
            Some(pair) => FeedWeights::Configured(*pair),
            None => FeedWeights::Unconfigured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_feed_resolves_mock_only() {
        let source = StaticWeightSource::empty();
        let weights = source.weights("price/btc_usd");
        assert!(!weights.is_configured());
        assert_eq!(weights.resolve(), WeightPair::MOCK_ONLY);
    }

    #[test]
    fn configured_feed_resolves_exact_pair() {
        let source = StaticWeightSource::empty().set("price/btc_usd", 0.7, 0.3);
        let weights = source.weights("price/btc_usd");
        assert!(weights.is_configured());
        assert_eq!(
            weights.resolve(),
            WeightPair {
                live: 0.7,
                mock: 0.3
            }
        );
    }

    #[test]
    fn weights_are_not_renormalized() {
        let source = StaticWeightSource::empty().set("x/y", 2.0, 2.0);
        let pair = source.weights("x/y").resolve();
        assert_eq!(pair.total(), 4.0);
    }

    #[test]
    fn missing_manifest_degrades_to_empty_table() {
        let source = FileWeightSource::load("/nonexistent/weights.json");
        assert_eq!(source.feed_count(), 0);
        assert!(source.checksum().is_none());
        assert!(!source.weights("price/btc_usd").is_configured());
    }

    #[test]
    fn manifest_parses_and_digests() {
        let dir = std::env::temp_dir().join("oracle-core-weights-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("weights.json");
        std::fs::write(
            &path,
            r#"{"price/btc_usd": {"live": 0.7, "mock": 0.3}}"#,
        )
        .unwrap();

        let source = FileWeightSource::load(&path);
        assert_eq!(source.feed_count(), 1);
        assert!(source.checksum().is_some());
        assert_eq!(source.checksum().unwrap().len(), 64);
        assert!(source.weights("price/btc_usd").is_configured());
        assert!(!source.weights("price/eth_usd").is_configured());

        std::fs::remove_file(&path).ok();
    }
}
