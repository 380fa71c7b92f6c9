//! Feed catalog
//!
//! The set of feeds this instance ingests, loaded from a JSON manifest.
//! Feed ids follow `namespace/name`; the namespace is what the version
//! registry tracks.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Namespace portion of a feed id (`"price/btc_usd"` -> `"price"`).
/// An id without a separator is its own namespace.
pub fn namespace_of(feed_id: &str) -> &str {
    feed_id.split('/').next().unwrap_or(feed_id)
}

/// Declaration of one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSpec {
    /// Feed identifier, `namespace/name`
    pub id: String,
    /// Provider names queried for live samples, in order
    pub providers: Vec<String>,
    /// Baseline for the deterministic mock side of the blend
    pub mock_value: f64,
}

/// Validated collection of feed declarations
#[derive(Debug, Clone, Default)]
pub struct FeedCatalog {
    feeds: Vec<FeedSpec>,
}

impl FeedCatalog {
    /// Build a catalog, rejecting structurally invalid declarations
    pub fn new(feeds: Vec<FeedSpec>) -> Result<Self> {
        for (index, feed) in feeds.iter().enumerate() {
            if feed.id.trim().is_empty() {
                bail!("invalid feed declaration at index {index}: empty id");
            }
            if feed.providers.is_empty() {
                bail!(
                    "invalid feed declaration at index {index}: feed '{}' has no providers",
                    feed.id
                );
            }
            if !feed.mock_value.is_finite() {
                bail!(
                    "invalid feed declaration at index {index}: feed '{}' has non-finite mock_value",
                    feed.id
                );
            }
            if feeds[..index].iter().any(|other| other.id == feed.id) {
                bail!("duplicate feed id '{}'", feed.id);
            }
        }
        Ok(FeedCatalog { feeds })
    }

    /// Load and validate a catalog manifest from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feed catalog {}", path.display()))?;
        let feeds: Vec<FeedSpec> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse feed catalog {}", path.display()))?;
        let catalog = Self::new(feeds)
            .with_context(|| format!("Invalid feed catalog {}", path.display()))?;
        info!(
            path = %path.display(),
            feeds = catalog.len(),
            "feed catalog loaded"
        );
        Ok(catalog)
    }

    /// Load a manifest, falling back to the built-in demo catalog when the
    /// file is missing or invalid
    pub fn load_or_demo(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "feed catalog unavailable, using built-in demo feeds"
                );
                Self::demo()
            }
        }
    }

    /// Built-in catalog used when no manifest is configured
    pub fn demo() -> Self {
        FeedCatalog {
            feeds: vec![
                FeedSpec {
                    id: "price/btc_usd".to_string(),
                    providers: vec!["coingecko".to_string(), "coinpaprika".to_string()],
                    mock_value: 64_000.0,
                },
                FeedSpec {
                    id: "price/eth_usd".to_string(),
                    providers: vec!["coingecko".to_string(), "coinpaprika".to_string()],
                    mock_value: 3_300.0,
                },
                FeedSpec {
                    id: "social/vox_hype".to_string(),
                    providers: vec!["vox".to_string()],
                    mock_value: 0.42,
                },
                FeedSpec {
                    id: "onchain/tvl_total_usd".to_string(),
                    providers: vec!["defillama".to_string()],
                    mock_value: 182_000_000_000.0,
                },
            ],
        }
    }

    pub fn feeds(&self) -> &[FeedSpec] {
        &self.feeds
    }

    pub fn get(&self, feed_id: &str) -> Option<&FeedSpec> {
        self.feeds.iter().find(|f| f.id == feed_id)
    }

    /// Unique provider names across all feeds, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .feeds
            .iter()
            .flat_map(|f| f.providers.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
