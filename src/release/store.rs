//! Release store trait definition.
//!
//! This module defines the read-only interface the diff pipeline needs from
//! a release storage backend.

use async_trait::async_trait;

use crate::error::Result;
use super::types::Release;

/// Trait for release storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Returns the latest revision of the named release.
    ///
    /// # Errors
    ///
    /// Returns `ReleaseError::NotFound` if the release has no revisions.
    async fn last(&self, name: &str) -> Result<Release>;

    /// Returns every revision of the named release, oldest first.
    ///
    /// An unknown release yields an empty list.
    async fn history(&self, name: &str) -> Result<Vec<Release>>;

    /// Gets the driver name.
    fn driver_name(&self) -> &'static str;
}

#[async_trait]
impl ReleaseStore for Box<dyn ReleaseStore> {
    async fn last(&self, name: &str) -> Result<Release> {
        (**self).last(name).await
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        (**self).history(name).await
    }

    fn driver_name(&self) -> &'static str {
        (**self).driver_name()
    }
}
