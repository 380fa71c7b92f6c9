//! Robust reducers for multi-provider live samples
//!
//! When several providers answer for the same feed, their readings are
//! reduced to a single live value before blending. Both reducers return
//! `None` on empty input instead of inventing a value.

/// One value with its relative weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSample {
    pub value: f64,
    pub weight: f64,
}

impl WeightedSample {
    pub fn new(value: f64, weight: f64) -> Self {
        WeightedSample { value, weight }
    }
}

/// Weighted median: the smallest value whose cumulative weight reaches
/// half of the total weight.
pub fn weighted_median(samples: &[WeightedSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let total: f64 = sorted.iter().map(|s| s.weight).sum();
    let threshold = total / 2.0;

    let mut cumulative = 0.0;
    for sample in &sorted {
        cumulative += sample.weight;
        if cumulative >= threshold {
            return Some(sample.value);
        }
    }
    // Only reachable when negative weights are in the mix.
    sorted.last().map(|s| s.value)
}

/// Weighted mean after trimming `trim_ratio` of the samples from each
/// tail. The trim is clamped so at least one sample survives.
pub fn trimmed_mean(samples: &[WeightedSample], trim_ratio: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

    let trim = ((sorted.len() as f64) * trim_ratio.max(0.0)).floor() as usize;
    let trim = trim.min((sorted.len() - 1) / 2);
    let kept = &sorted[trim..sorted.len() - trim];

    let denominator: f64 = kept.iter().map(|s| s.weight).sum();
    if denominator == 0.0 {
        return None;
    }
    let numerator: f64 = kept.iter().map(|s| s.value * s.weight).sum();
    Some(numerator / denominator)
}
