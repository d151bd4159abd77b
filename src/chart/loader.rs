//! Chart location and loading.
//!
//! A chart reference is resolved to a [`ChartSource`], then read into an
//! in-memory file map and assembled into a [`Chart`]. Directories and
//! archives go through the same assembly, so both honour the same layout:
//!
//! ```text
//! Chart.yaml
//! values.yaml
//! templates/
//! crds/
//! charts/<subchart>/ or charts/<subchart>.tgz
//! ```

use flate2::read::GzDecoder;
use reqwest::Client;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{is_url, parse_values, Settings};
use crate::error::{ChartError, Result};

use super::types::{Chart, ChartFile, ChartMetadata};

/// Timeout for downloading remote archives.
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Chart metadata file.
const CHART_FILE: &str = "Chart.yaml";

/// Default values file.
const VALUES_FILE: &str = "values.yaml";

/// Relative path to file contents.
type FileMap = BTreeMap<String, Vec<u8>>;

/// Where a chart is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    /// An unpacked chart directory.
    Directory(PathBuf),
    /// A local `.tgz` archive.
    Archive(PathBuf),
    /// A remote `.tgz` archive.
    Remote(String),
}

/// Resolves chart references and loads charts.
#[derive(Debug, Clone)]
pub struct ChartLoader {
    /// HTTP client for remote archives.
    client: Client,
    /// Directory holding `<repo>/<chart>` entries.
    repository_cache: PathBuf,
}

impl std::fmt::Display for ChartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(path) | Self::Archive(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

impl ChartLoader {
    /// Creates a loader using the settings' repository cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| ChartError::load("http", format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            repository_cache: settings.repository_cache.clone(),
        })
    }

    /// Resolves a chart reference.
    ///
    /// URLs are remote archives, existing directories and archive files are
    /// used as-is, and `repo/chart` is looked up in the repository cache.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::NotFound` if nothing matches.
    pub fn locate(&self, reference: &str) -> Result<ChartSource> {
        if is_url(reference) {
            return Ok(ChartSource::Remote(reference.to_string()));
        }

        let path = Path::new(reference);
        if path.is_dir() {
            return Ok(ChartSource::Directory(path.to_path_buf()));
        }
        if path.is_file() {
            if is_archive(path) {
                return Ok(ChartSource::Archive(path.to_path_buf()));
            }
            return Err(ChartError::load(reference, "file is not a chart archive").into());
        }

        if let Some((repo, name)) = split_repository_reference(reference) {
            let base = self.repository_cache.join(repo);
            let dir = base.join(name);
            if dir.is_dir() {
                debug!("Resolved {reference} to {}", dir.display());
                return Ok(ChartSource::Directory(dir));
            }
            let archive = base.join(format!("{name}.tgz"));
            if archive.is_file() {
                debug!("Resolved {reference} to {}", archive.display());
                return Ok(ChartSource::Archive(archive));
            }
        }

        Err(ChartError::NotFound {
            reference: reference.to_string(),
        }
        .into())
    }

    /// Loads a chart from a resolved source.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart cannot be read, is invalid, or is
    /// missing declared dependencies.
    pub async fn load(&self, source: &ChartSource) -> Result<Chart> {
        info!("Loading chart from {source}");

        match source {
            ChartSource::Directory(path) => Self::load_dir(path),
            ChartSource::Archive(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ChartError::load(path.display().to_string(), e.to_string()))?;
                Self::load_archive(&bytes, &path.display().to_string())
            }
            ChartSource::Remote(url) => {
                let bytes = self.download(url).await?;
                Self::load_archive(&bytes, url)
            }
        }
    }

    /// Loads an unpacked chart directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or the chart is
    /// invalid.
    pub fn load_dir(root: &Path) -> Result<Chart> {
        let source_ref = root.display().to_string();
        let mut files = FileMap::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| ChartError::load(&source_ref, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| ChartError::load(&source_ref, e.to_string()))?;
            let data = std::fs::read(entry.path())
                .map_err(|e| ChartError::load(&source_ref, format!("{}: {e}", relative.display())))?;
            files.insert(slash_path(relative), data);
        }

        assemble(files, &source_ref)
    }

    /// Loads a gzipped tar archive. The archive's top-level directory is
    /// stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be unpacked or the chart is
    /// invalid.
    pub fn load_archive(bytes: &[u8], source_ref: &str) -> Result<Chart> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut files = FileMap::new();

        let entries = archive
            .entries()
            .map_err(|e| ChartError::load(source_ref, e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ChartError::load(source_ref, e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry
                .path()
                .map_err(|e| ChartError::load(source_ref, e.to_string()))?
                .into_owned();

            if path.components().any(|c| matches!(c, Component::ParentDir)) {
                return Err(ChartError::load(
                    source_ref,
                    format!("illegal path in archive: {}", path.display()),
                )
                .into());
            }

            let relative: PathBuf = path.components().skip(1).collect();
            if relative.as_os_str().is_empty() {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| ChartError::load(source_ref, e.to_string()))?;
            files.insert(slash_path(&relative), data);
        }

        assemble(files, source_ref)
    }

    /// Downloads a remote archive.
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading chart archive from {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ChartError::load(url, e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChartError::load(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Builds a chart from its file map.
fn assemble(mut files: FileMap, source_ref: &str) -> Result<Chart> {
    let metadata_bytes = files
        .remove(CHART_FILE)
        .ok_or_else(|| ChartError::metadata(format!("{CHART_FILE} file is missing in {source_ref}")))?;
    let metadata: ChartMetadata = serde_yaml::from_slice(&metadata_bytes)
        .map_err(|e| ChartError::metadata(format!("{CHART_FILE}: {e}")))?;

    let values = match files.remove(VALUES_FILE) {
        Some(bytes) => parse_values(&utf8(bytes, VALUES_FILE, source_ref)?, VALUES_FILE)?,
        None => Mapping::new(),
    };

    let mut chart = Chart {
        metadata,
        values,
        ..Chart::default()
    };

    let mut subcharts: BTreeMap<String, FileMap> = BTreeMap::new();

    for (name, data) in files {
        if name.starts_with("templates/") {
            chart.templates.push(ChartFile {
                data: utf8(data, &name, source_ref)?,
                name,
            });
        } else if name.starts_with("crds/") {
            chart.crds.push(ChartFile {
                data: utf8(data, &name, source_ref)?,
                name,
            });
        } else if let Some(rest) = name.strip_prefix("charts/") {
            match rest.split_once('/') {
                Some((subchart, inner)) => {
                    subcharts
                        .entry(subchart.to_string())
                        .or_default()
                        .insert(inner.to_string(), data);
                }
                None if is_archive(Path::new(rest)) => {
                    let nested = format!("{source_ref}/{name}");
                    chart.dependencies.push(ChartLoader::load_archive(&data, &nested)?);
                }
                None => {}
            }
        }
    }

    for (subchart, subfiles) in subcharts {
        let nested = format!("{source_ref}/charts/{subchart}");
        chart.dependencies.push(assemble(subfiles, &nested)?);
    }

    chart.validate_metadata()?;
    chart.check_dependencies()?;

    debug!(
        "Loaded chart {} {} ({} templates, {} subcharts)",
        chart.metadata.name,
        chart.metadata.version,
        chart.templates.len(),
        chart.dependencies.len()
    );
    Ok(chart)
}

/// Converts file contents to UTF-8.
fn utf8(data: Vec<u8>, name: &str, source_ref: &str) -> Result<String> {
    String::from_utf8(data)
        .map_err(|_| ChartError::load(source_ref, format!("{name} is not valid UTF-8")).into())
}

/// Joins path components with `/`.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns true for `.tgz` and `.tar.gz` file names.
fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Splits `repo/chart`, rejecting anything that looks like a path.
fn split_repository_reference(reference: &str) -> Option<(&str, &str)> {
    if reference.starts_with('.') || reference.starts_with('/') {
        return None;
    }
    let (repo, name) = reference.split_once('/')?;
    if repo.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((repo, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    const CHART_YAML: &str = "apiVersion: v2\nname: web\nversion: 1.0.0\n";

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    fn settings(cache: &Path) -> Settings {
        Settings {
            repository_cache: cache.to_path_buf(),
            ..Settings::default()
        }
    }

    fn archive(prefix: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{prefix}/{name}"), content.as_bytes())
                .expect("append");
        }
        builder
            .into_inner()
            .expect("tar")
            .finish()
            .expect("gzip")
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "Chart.yaml", CHART_YAML);
        write(dir.path(), "values.yaml", "replicas: 2\n");
        write(dir.path(), "templates/service.yaml", "kind: Service\n");
        write(dir.path(), "templates/deployment.yaml", "kind: Deployment\n");
        write(dir.path(), "crds/crontab.yaml", "kind: CustomResourceDefinition\n");
        write(dir.path(), "README.md", "docs\n");

        let chart = ChartLoader::load_dir(dir.path()).expect("load");

        assert_eq!(chart.name(), "web");
        assert_eq!(chart.values.get("replicas"), Some(&serde_yaml::Value::Number(2.into())));
        let names: Vec<&str> = chart.templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["templates/deployment.yaml", "templates/service.yaml"]);
        assert_eq!(chart.crds.len(), 1);
    }

    #[test]
    fn test_load_dir_with_subchart() {
        let dir = TempDir::new().expect("temp dir");
        write(
            dir.path(),
            "Chart.yaml",
            "apiVersion: v2\nname: web\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: 1.x\n",
        );
        write(dir.path(), "charts/redis/Chart.yaml", "apiVersion: v2\nname: redis\nversion: 1.2.0\n");
        write(dir.path(), "charts/redis/templates/svc.yaml", "kind: Service\n");

        let chart = ChartLoader::load_dir(dir.path()).expect("load");
        assert_eq!(chart.dependencies.len(), 1);
        assert_eq!(chart.dependencies[0].name(), "redis");
        assert_eq!(chart.dependencies[0].templates[0].name, "templates/svc.yaml");
    }

    #[test]
    fn test_missing_dependency() {
        let dir = TempDir::new().expect("temp dir");
        write(
            dir.path(),
            "Chart.yaml",
            "apiVersion: v2\nname: web\nversion: 1.0.0\ndependencies:\n  - name: redis\n",
        );

        let err = ChartLoader::load_dir(dir.path()).expect_err("missing");
        assert!(matches!(err, DiffError::Chart(ChartError::MissingDependencies { .. })));
    }

    #[test]
    fn test_missing_chart_yaml() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "templates/a.yaml", "kind: A\n");

        let err = ChartLoader::load_dir(dir.path()).expect_err("no Chart.yaml");
        assert!(matches!(err, DiffError::Chart(ChartError::InvalidMetadata { .. })));
    }

    #[test]
    fn test_load_archive_strips_top_directory() {
        let bytes = archive(
            "web",
            &[
                ("Chart.yaml", CHART_YAML),
                ("templates/cm.yaml", "kind: ConfigMap\n"),
            ],
        );

        let chart = ChartLoader::load_archive(&bytes, "web-1.0.0.tgz").expect("load");
        assert_eq!(chart.name(), "web");
        assert_eq!(chart.templates[0].name, "templates/cm.yaml");
    }

    #[test]
    fn test_locate() {
        let cache = TempDir::new().expect("cache");
        write(cache.path(), "stable/web/Chart.yaml", CHART_YAML);
        std::fs::write(cache.path().join("stable/api.tgz"), b"").expect("write");

        let loader = ChartLoader::new(&settings(cache.path())).expect("loader");

        assert_eq!(
            loader.locate("stable/web").expect("dir"),
            ChartSource::Directory(cache.path().join("stable/web"))
        );
        assert_eq!(
            loader.locate("stable/api").expect("archive"),
            ChartSource::Archive(cache.path().join("stable/api.tgz"))
        );
        assert_eq!(
            loader.locate("https://example.com/web-1.0.0.tgz").expect("url"),
            ChartSource::Remote(String::from("https://example.com/web-1.0.0.tgz"))
        );

        let local = cache.path().join("stable/web");
        assert_eq!(
            loader.locate(&local.display().to_string()).expect("path"),
            ChartSource::Directory(local)
        );

        let err = loader.locate("stable/ghost").expect_err("missing");
        assert!(matches!(err, DiffError::Chart(ChartError::NotFound { .. })));
        assert!(loader.locate("./nowhere").is_err());
    }

    #[test]
    fn test_split_repository_reference() {
        assert_eq!(split_repository_reference("stable/web"), Some(("stable", "web")));
        assert_eq!(split_repository_reference("./web"), None);
        assert_eq!(split_repository_reference("a/b/c"), None);
        assert_eq!(split_repository_reference("web"), None);
    }
}
