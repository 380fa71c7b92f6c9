//! Lineage ledger
//!
//! Keeps signing claims for produced signals: who asserts having signed
//! which content, and when. Claims only; nothing here verifies a
//! signature cryptographically. Verification belongs to downstream
//! consumers holding the signer's key material.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::ConsensusResult;

/// One signing claim: `signer` asserts it signed content `digest` for
/// `signal_id` at `signed_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Identity of the signal; one claim is kept per id
    pub signal_id: String,
    /// Who claims to have signed
    pub signer: String,
    /// sha256 hex digest of the signed content
    pub digest: String,
    /// When the claim was recorded
    pub signed_at: DateTime<Utc>,
}

/// In-memory map of signing claims, one per signal id.
///
/// Re-recording the same id replaces the previous claim, so a ledger keyed
/// by stable feed ids stays bounded and always holds the latest claim.
#[derive(Debug, Default)]
pub struct SignatureLedger {
    records: RwLock<HashMap<String, SignatureRecord>>,
}

impl SignatureLedger {
    pub fn new() -> Self {
        SignatureLedger::default()
    }

    /// Record a claim for `signal_id`, replacing any existing one
    pub fn record(&self, signal_id: &str, signer: &str, digest: &str) -> SignatureRecord {
        let record = SignatureRecord {
            signal_id: signal_id.to_string(),
            signer: signer.to_string(),
            digest: digest.to_string(),
            signed_at: Utc::now(),
        };
        self.write_records()
            .insert(signal_id.to_string(), record.clone());
        debug!(signal = signal_id, signer = signer, "signature recorded");
        record
    }

    /// Latest claim for `signal_id`, if one exists
    pub fn lookup(&self, signal_id: &str) -> Option<SignatureRecord> {
        self.read_records().get(signal_id).cloned()
    }

    /// All claims, sorted by signal id
    pub fn records(&self) -> Vec<SignatureRecord> {
        let mut records: Vec<SignatureRecord> = self.read_records().values().cloned().collect();
        records.sort_by(|a, b| a.signal_id.cmp(&b.signal_id));
        records
    }

    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }

    fn read_records(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SignatureRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_records(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SignatureRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// sha256 hex digest of a blended result's identifying content.
///
/// Covers feed id, the exact value bits and the computation timestamp, so
/// two blends of the same feed at different times digest differently.
pub fn content_digest(result: &ConsensusResult) -> String {
    let mut hasher = Sha256::new();
    hasher.update(result.feed_id.as_bytes());
    hasher.update(b"|");
    hasher.update(result.value.to_bits().to_be_bytes());
    hasher.update(b"|");
    hasher.update(result.computed_at.timestamp_millis().to_be_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_result(feed_id: &str, value: f64, ts_ms: i64) -> ConsensusResult {
        ConsensusResult {
            feed_id: feed_id.to_string(),
            value,
            live_weight: 0.7,
            mock_weight: 0.3,
            computed_at: Utc.timestamp_millis_opt(ts_ms).unwrap(),
        }
    }

    #[test]
    fn record_then_lookup_returns_the_claim() {
        let ledger = SignatureLedger::new();
        ledger.record("price/btc_usd", "oracle-core", "abc123");

        let record = ledger.lookup("price/btc_usd").unwrap();
        assert_eq!(record.signal_id, "price/btc_usd");
        assert_eq!(record.signer, "oracle-core");
        assert_eq!(record.digest, "abc123");
    }

    #[test]
    fn lookup_unknown_signal_is_none() {
        let ledger = SignatureLedger::new();
        assert!(ledger.lookup("never/recorded").is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn rerecord_replaces_previous_claim() {
        let ledger = SignatureLedger::new();
        ledger.record("price/eth_usd", "signer-a", "old-digest");
        ledger.record("price/eth_usd", "signer-b", "new-digest");

        assert_eq!(ledger.len(), 1);
        let record = ledger.lookup("price/eth_usd").unwrap();
        assert_eq!(record.signer, "signer-b");
        assert_eq!(record.digest, "new-digest");
    }

    #[test]
    fn records_are_sorted_by_signal_id() {
        let ledger = SignatureLedger::new();
        ledger.record("z/last", "s", "1");
        ledger.record("a/first", "s", "2");
        ledger.record("m/middle", "s", "3");

        let ids: Vec<String> = ledger.records().into_iter().map(|r| r.signal_id).collect();
        assert_eq!(ids, vec!["a/first", "m/middle", "z/last"]);
    }

    #[test]
    fn digest_is_stable_for_identical_content() {
        let a = make_result("price/btc_usd", 64_700.0, 1_700_000_000_000);
        let b = make_result("price/btc_usd", 64_700.0, 1_700_000_000_000);
        assert_eq!(content_digest(&a), content_digest(&b));
        assert_eq!(content_digest(&a).len(), 64);
    }

    #[test]
    fn digest_changes_with_any_component() {
        let base = make_result("price/btc_usd", 64_700.0, 1_700_000_000_000);
        let other_feed = make_result("price/eth_usd", 64_700.0, 1_700_000_000_000);
        let other_value = make_result("price/btc_usd", 64_700.5, 1_700_000_000_000);
        let other_time = make_result("price/btc_usd", 64_700.0, 1_700_000_060_000);

        let digest = content_digest(&base);
        assert_ne!(digest, content_digest(&other_feed));
        assert_ne!(digest, content_digest(&other_value));
        assert_ne!(digest, content_digest(&other_time));
    }
}
