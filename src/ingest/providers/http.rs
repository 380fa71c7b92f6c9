//! HTTP JSON sample provider
//!
//! Fetches a JSON document and pulls one numeric value out of it by a
//! dotted path. The raw response body is digested into the evidence so a
//! sample can be traced back to the exact payload it came from.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::ingest::providers::SampleProvider;
use crate::registry::FeedSpec;
use crate::types::{EvidenceRef, RawSample};

/// Live provider backed by a JSON-over-HTTP endpoint.
///
/// The URL template may contain `{feed}`, replaced with the feed id at
/// fetch time.
pub struct HttpSampleProvider {
    source_id: String,
    client: reqwest::Client,
    url_template: String,
    value_path: String,
    weight: f64,
}

impl HttpSampleProvider {
    pub fn new(
        source_id: impl Into<String>,
        url_template: impl Into<String>,
        value_path: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(HttpSampleProvider {
            source_id: source_id.into(),
            client,
            url_template: url_template.into(),
            value_path: value_path.into(),
            weight: 1.0,
        })
    }

    /// Relative weight of this source inside the live reduction
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Walk a dotted path ("data.price") into a JSON document
    fn extract_value(payload: &serde_json::Value, path: &str) -> Option<f64> {
        let mut cursor = payload;
        for segment in path.split('.') {
            if segment.is_empty() {
                continue;
            }
            cursor = cursor.get(segment)?;
        }
        cursor.as_f64()
    }
}

#[async_trait]
impl SampleProvider for HttpSampleProvider {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RawSample> {
        let url = self.url_template.replace("{feed}", &feed.id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch sample from {}", self.source_id))?;

        if !response.status().is_success() {
            bail!(
                "{} returned error status: {}",
                self.source_id,
                response.status()
            );
        }

        let raw = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} response body", self.source_id))?;
        let payload: serde_json::Value = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse {} response body", self.source_id))?;

        let value = Self::extract_value(&payload, &self.value_path).ok_or_else(|| {
            anyhow!(
                "no numeric value at '{}' in {} response",
                self.value_path,
                self.source_id
            )
        })?;

        Ok(RawSample {
            value,
            weight: self.weight,
            confidence: 1.0,
            evidence: vec![EvidenceRef {
                source_id: self.source_id.clone(),
                url: Some(url),
                content_hash: Some(hex::encode(Sha256::digest(&raw))),
                captured_at: Utc::now(),
            }],
        })
    }
}
