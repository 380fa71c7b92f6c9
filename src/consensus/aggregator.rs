//! Consensus aggregator - combines live and mock inputs into one signal
//!
//! The blend is a plain weighted sum with weights resolved per feed.
//! A missing live value contributes zero, so a feed whose providers all
//! failed still produces a signal from its mock side.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::consensus::weights::WeightSource;
use crate::types::ConsensusResult;

/// Blends one live reading with one mock reading per feed
pub struct ConsensusAggregator {
    weights: Arc<dyn WeightSource>,
}

impl ConsensusAggregator {
    pub fn new(weights: Arc<dyn WeightSource>) -> Self {
        ConsensusAggregator { weights }
    }

    /// Compute `live * live_weight + mock * mock_weight` for the feed.
    ///
    /// `live` is `None` when no provider produced a usable sample this
    /// cycle; it is treated as zero. Weights are applied exactly as
    /// configured, with mock-only as the fallback for unconfigured feeds.
    pub fn blend(&self, feed_id: &str, live: Option<f64>, mock: f64) -> ConsensusResult {
        let resolved = self.weights.weights(feed_id);
        if !resolved.is_configured() {
            debug!(feed = feed_id, "no weights configured, blending mock-only");
        }
        let pair = resolved.resolve();

        let live_value = live.unwrap_or(0.0);
        let value = live_value * pair.live + mock * pair.mock;

        ConsensusResult {
            feed_id: feed_id.to_string(),
            value,
            live_weight: pair.live,
            mock_weight: pair.mock,
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::weights::StaticWeightSource;

    fn aggregator_with(source: StaticWeightSource) -> ConsensusAggregator {
        ConsensusAggregator::new(Arc::new(source))
    }

    #[test]
    fn test_blend_applies_configured_weights() {
        let aggregator =
            aggregator_with(StaticWeightSource::empty().set("price/btc_usd", 0.7, 0.3));

        let result = aggregator.blend("price/btc_usd", Some(65_000.0), 64_000.0);
        assert!((result.value - 64_700.0).abs() < 1e-9);
        assert_eq!(result.live_weight, 0.7);
        assert_eq!(result.mock_weight, 0.3);
        assert_eq!(result.feed_id, "price/btc_usd");
    }

    #[test]
    fn test_unconfigured_feed_returns_mock_value() {
        let aggregator = aggregator_with(StaticWeightSource::empty());

        let result = aggregator.blend("social/vox_hype", Some(100.0), 5.0);
        assert_eq!(result.value, 5.0);
        assert_eq!(result.live_weight, 0.0);
        assert_eq!(result.mock_weight, 1.0);
    }

    #[test]
    fn test_missing_live_contributes_zero() {
        let aggregator =
            aggregator_with(StaticWeightSource::empty().set("price/eth_usd", 0.6, 0.4));

        let result = aggregator.blend("price/eth_usd", None, 3_000.0);
        assert!((result.value - 1_200.0).abs() < 1e-9);
    }

    #[test]
    fn test_blend_is_linear_in_inputs() {
        let aggregator = aggregator_with(StaticWeightSource::empty().set("x/y", 0.5, 0.5));

        let a = aggregator.blend("x/y", Some(10.0), 20.0);
        let b = aggregator.blend("x/y", Some(20.0), 40.0);
        assert!((b.value - 2.0 * a.value).abs() < 1e-9);
    }

    #[test]
    fn test_weights_are_not_renormalized() {
        let aggregator = aggregator_with(StaticWeightSource::empty().set("x/y", 2.0, 2.0));

        let result = aggregator.blend("x/y", Some(1.0), 1.0);
        assert_eq!(result.value, 4.0);
    }
}
