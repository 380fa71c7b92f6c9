//! Deterministic mock samples
//!
//! Values derive from a seed and the feed id only, so the same
//! configuration reproduces the same numbers run after run. Each value
//! is the feed's baseline with a small seeded jitter.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ingest::providers::SampleProvider;
use crate::registry::FeedSpec;
use crate::types::{EvidenceRef, RawSample};

/// Maximum jitter applied around the baseline, as a fraction
const JITTER_SPAN: f64 = 0.02;

/// Seeded generator of synthetic samples
pub struct MockSampleProvider {
    seed: u64,
    source_id: String,
}

impl MockSampleProvider {
    pub fn new(seed: u64) -> Self {
        MockSampleProvider {
            seed,
            source_id: "mock".to_string(),
        }
    }

    /// A mock stand-in for a named live source. Gets its own value stream
    /// and labels its evidence `mock:<name>`.
    pub fn for_source(seed: u64, name: &str) -> Self {
        MockSampleProvider {
            seed: seed ^ fnv1a(name),
            source_id: format!("mock:{}", name),
        }
    }

    fn value_for(&self, feed: &FeedSpec) -> f64 {
        let mut rng = StdRng::seed_from_u64(self.seed ^ fnv1a(&feed.id));
        let jitter = rng.gen_range(-JITTER_SPAN..JITTER_SPAN);
        feed.mock_value * (1.0 + jitter)
    }
}

#[async_trait]
impl SampleProvider for MockSampleProvider {
    async fn fetch(&self, feed: &FeedSpec) -> anyhow::Result<RawSample> {
        Ok(RawSample {
            value: self.value_for(feed),
            weight: 1.0,
            confidence: 1.0,
            evidence: vec![EvidenceRef {
                source_id: self.source_id.clone(),
                url: None,
                content_hash: None,
                captured_at: Utc::now(),
            }],
        })
    }
}

fn fnv1a(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
