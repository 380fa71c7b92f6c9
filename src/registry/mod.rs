//! Registry module - namespace versions and the feed catalog
//!
//! Versions move forward only. Every successful ingest cycle bumps the
//! namespace a feed belongs to, so consumers can tell stale reads from
//! fresh ones with a single integer compare.

pub mod catalog;

pub use catalog::{namespace_of, FeedCatalog, FeedSpec};

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;

/// Errors raised by the version registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("version regression for namespace '{namespace}': current {current}, requested {requested}")]
    VersionRegression {
        namespace: String,
        current: u64,
        requested: u64,
    },
}

/// Monotonic version counter per namespace
#[derive(Debug, Default)]
pub struct VersionRegistry {
    versions: RwLock<HashMap<String, u64>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        VersionRegistry::default()
    }

    /// Set a namespace to an explicit version.
    ///
    /// Equal to the current version is allowed (idempotent re-set); lower
    /// is rejected. A namespace not seen before accepts any version.
    pub fn set_version(&self, namespace: &str, version: u64) -> Result<(), RegistryError> {
        let mut versions = self.write_versions();
        match versions.get(namespace) {
            Some(&current) if version < current => Err(RegistryError::VersionRegression {
                namespace: namespace.to_string(),
                current,
                requested: version,
            }),
            _ => {
                versions.insert(namespace.to_string(), version);
                Ok(())
            }
        }
    }

    /// Current version of a namespace, `None` if never set
    pub fn get_version(&self, namespace: &str) -> Option<u64> {
        self.read_versions().get(namespace).copied()
    }

    /// Increment a namespace by one and return the new version. Unseen
    /// namespaces start at 1. Read and write happen under one lock.
    pub fn bump(&self, namespace: &str) -> u64 {
        let mut versions = self.write_versions();
        let next = versions.get(namespace).copied().unwrap_or(0) + 1;
        versions.insert(namespace.to_string(), next);
        debug!(namespace = namespace, version = next, "namespace bumped");
        next
    }

    /// Snapshot of every namespace and its version
    pub fn list_versions(&self) -> HashMap<String, u64> {
        self.read_versions().clone()
    }

    fn read_versions(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, u64>> {
        match self.versions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_versions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, u64>> {
        match self.versions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
