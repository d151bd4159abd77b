//! File-based release storage backend.
//!
//! Each revision is a JSON document at
//! `<base_dir>/<namespace>/<name>.v<version>.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{ReleaseError, Result};

use super::store::ReleaseStore;
use super::types::Release;

/// Extension of release record files.
const RECORD_EXTENSION: &str = "json";

/// File-based release store scoped to one namespace.
#[derive(Debug)]
pub struct FileReleaseStore {
    /// Root directory holding one sub-directory per namespace.
    base_dir: PathBuf,
    /// Namespace this store reads from.
    namespace: String,
}

impl FileReleaseStore {
    /// Creates a store rooted at `base_dir` for the given namespace.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            namespace: namespace.into(),
        }
    }

    /// Directory holding this namespace's records.
    #[must_use]
    pub fn namespace_dir(&self) -> PathBuf {
        self.base_dir.join(&self.namespace)
    }

    /// Path of the record for a given revision.
    #[must_use]
    pub fn record_path(&self, name: &str, version: u32) -> PathBuf {
        self.namespace_dir()
            .join(format!("{name}.v{version}.{RECORD_EXTENSION}"))
    }

    /// Writes a release record, creating directories as needed.
    ///
    /// The diff pipeline never calls this; it exists to seed stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub async fn save(&self, release: &Release) -> Result<()> {
        let dir = self.namespace_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReleaseError::storage(format!("Failed to create {}: {e}", dir.display())))?;

        let content = serde_json::to_string_pretty(release)
            .map_err(|e| ReleaseError::storage(format!("Failed to serialize release: {e}")))?;

        let path = self.record_path(&release.name, release.version);
        fs::write(&path, content)
            .await
            .map_err(|e| ReleaseError::storage(format!("Failed to write {}: {e}", path.display())))?;

        info!("Saved release {} v{} to {}", release.name, release.version, path.display());
        Ok(())
    }

    /// Extracts the revision number from a record file name.
    fn parse_version(file_name: &str, name: &str) -> Option<u32> {
        file_name
            .strip_prefix(name)?
            .strip_prefix(".v")?
            .strip_suffix(RECORD_EXTENSION)?
            .strip_suffix('.')?
            .parse()
            .ok()
    }

    /// Lists the revision numbers stored for a release, ascending.
    async fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.namespace_dir();
        if !dir.exists() {
            debug!("Release directory does not exist: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| ReleaseError::storage(format!("Failed to list {}: {e}", dir.display())))?;

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ReleaseError::storage(format!("Failed to list {}: {e}", dir.display())))?
        {
            if let Some(version) = entry
                .file_name()
                .to_str()
                .and_then(|file_name| Self::parse_version(file_name, name))
            {
                versions.push(version);
            }
        }

        versions.sort_unstable();
        Ok(versions)
    }

    /// Reads and decodes one record file.
    async fn read_record(path: &Path) -> Result<Release> {
        let content = fs::read_to_string(path).await.map_err(|e| ReleaseError::Corrupted {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        let release = serde_json::from_str(&content).map_err(|e| ReleaseError::Corrupted {
            message: format!("Failed to parse {}: {e}", path.display()),
        })?;

        Ok(release)
    }
}

#[async_trait]
impl ReleaseStore for FileReleaseStore {
    async fn last(&self, name: &str) -> Result<Release> {
        let latest = self
            .versions(name)
            .await?
            .pop()
            .ok_or_else(|| ReleaseError::not_found(name))?;

        let path = self.record_path(name, latest);
        debug!("Loading release {name} v{latest} from {}", path.display());
        Self::read_record(&path).await
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        for version in self.versions(name).await? {
            releases.push(Self::read_record(&self.record_path(name, version)).await?);
        }
        Ok(releases)
    }

    fn driver_name(&self) -> &'static str {
        "file"
    }
}
