//! Blend validation
//!
//! Last gate before a result is signed and recorded. Validation never
//! mutates anything, it only reports what is wrong.

use std::fmt;

use serde::Serialize;

use crate::types::ConsensusResult;

/// A specific defect found in a blended result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Blended value is NaN
    ValueNotANumber,
    /// Both weights are zero or negative, nothing contributed
    ZeroWeightBlend,
    /// No evidence backs the inputs
    MissingEvidence,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::ValueNotANumber => write!(f, "blended value is not a number"),
            ValidationIssue::ZeroWeightBlend => write!(f, "weights sum to zero"),
            ValidationIssue::MissingEvidence => write!(f, "no evidence recorded"),
        }
    }
}

/// Outcome of validating one blended result
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check a blended result against the structural rules.
///
/// `evidence_count` is the total number of evidence references across the
/// live and mock inputs that went into this result.
pub fn validate_result(result: &ConsensusResult, evidence_count: usize) -> ValidationReport {
    let mut issues = Vec::new();

    if result.value.is_nan() {
        issues.push(ValidationIssue::ValueNotANumber);
    }
    if result.live_weight + result.mock_weight <= 0.0 {
        issues.push(ValidationIssue::ZeroWeightBlend);
    }
    if evidence_count == 0 {
        issues.push(ValidationIssue::MissingEvidence);
    }

    ValidationReport { issues }
}
