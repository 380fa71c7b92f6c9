//! Consensus module - live/mock signal blending
//!
//! Combines a reduced live reading with a deterministic mock baseline
//! using per-feed weights, and validates the blend before it is signed.

mod aggregator;
pub mod robust;
pub mod validate;
pub mod weights;

pub use aggregator::ConsensusAggregator;
pub use weights::{FeedWeights, FileWeightSource, StaticWeightSource, WeightSource};
