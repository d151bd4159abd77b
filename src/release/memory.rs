//! In-memory release storage backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{DiffError, ReleaseError, Result};

use super::store::ReleaseStore;
use super::types::Release;

/// In-memory release store scoped to one namespace.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    /// Namespace this store reads from.
    namespace: String,
    /// Revisions keyed by release name, kept sorted by version.
    releases: RwLock<HashMap<String, Vec<Release>>>,
}

impl MemoryReleaseStore {
    /// Creates an empty store for the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            releases: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a revision. Revisions from other namespaces are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn insert(&self, release: Release) -> Result<()> {
        if release.namespace != self.namespace {
            return Ok(());
        }

        let mut releases = self
            .releases
            .write()
            .map_err(|_| DiffError::internal("release store lock poisoned"))?;

        let revisions = releases.entry(release.name.clone()).or_default();
        revisions.retain(|r| r.version != release.version);
        revisions.push(release);
        revisions.sort_by_key(|r| r.version);
        Ok(())
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn last(&self, name: &str) -> Result<Release> {
        self.history(name)
            .await?
            .pop()
            .ok_or_else(|| ReleaseError::not_found(name).into())
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        let releases = self
            .releases
            .read()
            .map_err(|_| DiffError::internal("release store lock poisoned"))?;
        Ok(releases.get(name).cloned().unwrap_or_default())
    }

    fn driver_name(&self) -> &'static str {
        "memory"
    }
}
