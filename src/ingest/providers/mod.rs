//! Sample provider implementations (HTTP JSON and deterministic mock)

mod http;
mod mock;

pub use http::HttpSampleProvider;
pub use mock::MockSampleProvider;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::registry::FeedSpec;
use crate::types::RawSample;

/// A source of raw live samples
#[async_trait]
pub trait SampleProvider: Send + Sync {
    /// Fetch one reading for the feed
    async fn fetch(&self, feed: &FeedSpec) -> Result<RawSample>;
}

/// Providers addressable by the names feed declarations reference
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SampleProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn SampleProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SampleProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
