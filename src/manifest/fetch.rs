//! Retrieval of the currently deployed manifest.

use tracing::debug;

use crate::error::Result;
use crate::release::ReleaseStore;

use super::filter::remove_secrets;

/// Manifest of the deployed release, ready to be diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedManifest {
    /// Trimmed manifest with secrets removed.
    pub manifest: String,
    /// Revision the manifest was read from.
    pub version: u32,
    /// Chart reference the release was installed from, if recorded.
    pub chart_source: Option<String>,
}

/// Reads the last deployed manifest of a release.
pub struct ReleaseFetcher<'a, S: ReleaseStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReleaseStore + ?Sized> ReleaseFetcher<'a, S> {
    /// Creates a fetcher over a release store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetches the latest revision of `name` and normalizes its manifest.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged, including
    /// `ReleaseError::NotFound` for an unknown release.
    pub async fn fetch(&self, name: &str) -> Result<DeployedManifest> {
        let release = self.store.last(name).await?;
        debug!(
            "Fetched release {} v{} ({}) from {} store",
            release.name,
            release.version,
            release.info.status,
            self.store.driver_name()
        );

        Ok(DeployedManifest {
            manifest: remove_secrets(release.manifest.trim()),
            version: release.version,
            chart_source: release.chart.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiffError, ReleaseError};
    use crate::release::{ChartReference, MockReleaseStore, Release};

    #[tokio::test]
    async fn test_fetch_trims_and_removes_secrets() {
        let mut store = MockReleaseStore::new();
        store
            .expect_last()
            .withf(|name| name == "myapp")
            .times(1)
            .returning(|name| {
                Ok(Release::new(
                    name,
                    "default",
                    3,
                    "\n\nkind: Secret\ndata: {}\n---\nkind: ConfigMap\ndata: {a: 1}\n\n",
                )
                .with_chart(ChartReference {
                    name: String::from("web"),
                    version: String::from("1.0.0"),
                    source: Some(String::from("./charts/web")),
                }))
            });
        store.expect_driver_name().return_const("mock");

        let deployed = ReleaseFetcher::new(&store).fetch("myapp").await.expect("fetch");

        assert_eq!(deployed.manifest, "kind: ConfigMap\ndata: {a: 1}");
        assert_eq!(deployed.version, 3);
        assert_eq!(deployed.chart_source.as_deref(), Some("./charts/web"));
    }

    #[tokio::test]
    async fn test_fetch_missing_release() {
        let mut store = MockReleaseStore::new();
        store
            .expect_last()
            .times(1)
            .returning(|name| Err(ReleaseError::not_found(name).into()));

        let err = ReleaseFetcher::new(&store).fetch("ghost").await.expect_err("missing");

        assert!(matches!(err, DiffError::Release(ReleaseError::NotFound { .. })));
        assert_eq!(err.to_string(), "Release error: release: not found: ghost");
    }
}
