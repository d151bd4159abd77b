//! Process-wide settings.
//!
//! Settings are read once at startup from the environment (after an
//! optional `.env` file) and passed by reference to every component. No
//! other module reads the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{ConfigError, DiffError, Result};

/// Selects the release storage driver.
pub const ENV_DRIVER: &str = "CHARTDIFF_DRIVER";
/// Default namespace.
pub const ENV_NAMESPACE: &str = "CHARTDIFF_NAMESPACE";
/// Root directory of the file release store.
pub const ENV_STORAGE_PATH: &str = "CHARTDIFF_STORAGE_PATH";
/// Directory holding repository charts.
pub const ENV_REPOSITORY_CACHE: &str = "CHARTDIFF_REPOSITORY_CACHE";
/// Kubernetes version exposed to templates.
pub const ENV_KUBE_VERSION: &str = "CHARTDIFF_KUBE_VERSION";
/// Enables debug output.
pub const ENV_DEBUG: &str = "CHARTDIFF_DEBUG";

/// Namespace used when none is configured.
const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes version used when none is configured.
const DEFAULT_KUBE_VERSION: &str = "v1.30.0";

/// Application directory name under the platform data and cache dirs.
const APP_DIR: &str = "chartdiff";

/// Release storage drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageDriver {
    /// JSON records on the local filesystem.
    #[default]
    File,
    /// Empty in-process store.
    Memory,
}

impl FromStr for StorageDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownDriver {
                driver: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Settings shared by every component of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Namespace used when the command does not name one.
    pub namespace: String,
    /// Release storage driver.
    pub driver: StorageDriver,
    /// Root directory of the file release store.
    pub storage_path: PathBuf,
    /// Directory holding `<repo>/<chart>` entries.
    pub repository_cache: PathBuf,
    /// Kubernetes version exposed to templates.
    pub kube_version: String,
    /// Whether debug output is enabled.
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            driver: StorageDriver::default(),
            storage_path: default_dir(dirs::data_dir(), "releases"),
            repository_cache: default_dir(dirs::cache_dir(), "repository"),
            kube_version: DEFAULT_KUBE_VERSION.to_string(),
            debug: false,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through a variable lookup function.
    ///
    /// Unset and empty variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(driver) = get(ENV_DRIVER) {
            settings.driver = driver.parse()?;
        }
        if let Some(namespace) = get(ENV_NAMESPACE) {
            settings.namespace = namespace;
        }
        if let Some(path) = get(ENV_STORAGE_PATH) {
            settings.storage_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_REPOSITORY_CACHE) {
            settings.repository_cache = PathBuf::from(path);
        }
        if let Some(version) = get(ENV_KUBE_VERSION) {
            settings.kube_version = version;
        }
        if let Some(debug) = get(ENV_DEBUG) {
            settings.debug = parse_bool(ENV_DEBUG, &debug)?;
        }

        debug!(
            "Settings: driver={}, namespace={}, storage={}",
            settings.driver,
            settings.namespace,
            settings.storage_path.display()
        );
        Ok(settings)
    }

    /// Loads a `.env` file from `dir` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_dotenv(dir: &Path) -> Result<()> {
        let env_path = dir.join(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::InvalidValue {
                name: env_path.display().to_string(),
                message: e.to_string(),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Enables debug output when `debug` is set; never disables it.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = self.debug || debug;
        self
    }
}

/// Builds `<base>/chartdiff/<leaf>`, falling back to the working directory.
fn default_dir(base: Option<PathBuf>, leaf: &str) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(leaf)
}

/// Parses a boolean environment value.
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(DiffError::Config(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("expected a boolean, got \"{other}\""),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).expect("settings");
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.driver, StorageDriver::File);
        assert!(!settings.debug);
        assert!(settings.storage_path.ends_with("chartdiff/releases"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_DRIVER, "memory"),
            (ENV_NAMESPACE, "prod"),
            (ENV_STORAGE_PATH, "/var/lib/releases"),
            (ENV_DEBUG, "true"),
        ]))
        .expect("settings");

        assert_eq!(settings.driver, StorageDriver::Memory);
        assert_eq!(settings.namespace, "prod");
        assert_eq!(settings.storage_path, PathBuf::from("/var/lib/releases"));
        assert!(settings.debug);
    }

    #[test]
    fn test_empty_driver_is_default() {
        let settings = Settings::from_lookup(lookup(&[(ENV_DRIVER, "")])).expect("settings");
        assert_eq!(settings.driver, StorageDriver::File);
    }

    #[test]
    fn test_unknown_driver() {
        let err = Settings::from_lookup(lookup(&[(ENV_DRIVER, "sql")])).expect_err("unknown");
        assert!(matches!(
            err,
            DiffError::Config(ConfigError::UnknownDriver { ref driver }) if driver == "sql"
        ));
    }

    #[test]
    fn test_invalid_debug_value() {
        let result = Settings::from_lookup(lookup(&[(ENV_DEBUG, "sometimes")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_with_debug_never_disables() {
        let settings = Settings::from_lookup(lookup(&[(ENV_DEBUG, "1")]))
            .expect("settings")
            .with_debug(false);
        assert!(settings.debug);
    }
}
