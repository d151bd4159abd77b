//! Error types for the chartdiff preview pipeline.
//!
//! This module provides the error hierarchy for every stage of a diff run:
//! release retrieval, chart resolution, values merging, rendering and
//! settings.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for chartdiff.
#[derive(Debug, Error)]
pub enum DiffError {
    /// Release store errors.
    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    /// Chart location, loading or validation errors.
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    /// Values merging errors.
    #[error("Values error: {0}")]
    Values(#[from] ValuesError),

    /// Rendering errors.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Settings errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The render was cancelled by a signal.
    #[error("Release {release} has been cancelled.")]
    Cancelled {
        /// Name of the release being previewed.
        release: String,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Release store errors.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// No record exists for the release.
    #[error("release: not found: {name}")]
    NotFound {
        /// Name of the missing release.
        name: String,
    },

    /// A stored record could not be decoded.
    #[error("Release record is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The storage backend failed.
    #[error("Release storage failure: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

/// Chart location, loading and validation errors.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The chart reference did not resolve to anything.
    #[error("Chart not found: {reference}")]
    NotFound {
        /// The reference that was looked up.
        reference: String,
    },

    /// The chart files could not be read or unpacked.
    #[error("Failed to load chart from {source_ref}: {message}")]
    Load {
        /// Where the chart was being loaded from.
        source_ref: String,
        /// Description of the failure.
        message: String,
    },

    /// `Chart.yaml` is missing or invalid.
    #[error("Invalid chart metadata: {message}")]
    InvalidMetadata {
        /// Description of the problem.
        message: String,
    },

    /// Declared dependencies are absent from `charts/`.
    #[error("found in Chart.yaml, but missing in charts/ directory: {}", names.join(", "))]
    MissingDependencies {
        /// Names of the missing dependencies.
        names: Vec<String>,
    },

    /// The chart type cannot be installed.
    #[error("{chart_type} charts are not installable")]
    UninstallableType {
        /// The declared chart type.
        chart_type: String,
    },
}

/// Values merging errors.
#[derive(Debug, Error)]
pub enum ValuesError {
    /// A values file could not be read.
    #[error("Failed to read values file {path}: {message}")]
    FileRead {
        /// Path of the file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A values source is not valid YAML or not a map.
    #[error("Failed to parse {source_ref}: {message}")]
    Parse {
        /// File, URL or flag the values came from.
        source_ref: String,
        /// Description of the parse error.
        message: String,
    },

    /// A `--set` style assignment is malformed.
    #[error("failed parsing --{flag} data: {message}")]
    InvalidKey {
        /// Flag the assignment came from.
        flag: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A remote values file could not be fetched.
    #[error("Failed to fetch values from {url}: {message}")]
    Fetch {
        /// URL of the values file.
        url: String,
        /// Description of the failure.
        message: String,
    },
}

/// Rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to evaluate.
    #[error("template: {name}: {message}")]
    Template {
        /// Template path.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// A rendered document is not valid YAML.
    #[error("YAML parse error on {name}: {message}")]
    InvalidYaml {
        /// Template path the document came from.
        name: String,
        /// Description of the parse error.
        message: String,
    },

    /// The render failed after producing partial output.
    #[error("{message}")]
    Incomplete {
        /// Description of the failure, including any user hint.
        message: String,
        /// The partial manifest, kept only in debug mode.
        partial_manifest: Option<String>,
    },

    /// The requested install options are not supported for a preview.
    #[error("Unsupported install options: {message}")]
    Unsupported {
        /// Description of the problem.
        message: String,
    },
}

/// Settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The storage driver name is unknown.
    #[error("unknown release storage driver \"{driver}\"")]
    UnknownDriver {
        /// The requested driver name.
        driver: String,
    },

    /// A setting has an invalid value.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the setting.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

/// Result type alias for chartdiff operations.
pub type Result<T> = std::result::Result<T, DiffError>;

impl DiffError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a cancellation error for the given release.
    #[must_use]
    pub fn cancelled(release: impl Into<String>) -> Self {
        Self::Cancelled {
            release: release.into(),
        }
    }

    /// Returns true if this error comes from a cooperative cancellation.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the partial manifest carried by a failed render, if any.
    #[must_use]
    pub fn partial_manifest(&self) -> Option<&str> {
        match self {
            Self::Render(RenderError::Incomplete {
                partial_manifest, ..
            }) => partial_manifest.as_deref(),
            _ => None,
        }
    }
}

impl ReleaseError {
    /// Creates a not-found error for the given release name.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl ChartError {
    /// Creates a load error.
    #[must_use]
    pub fn load(source_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            source_ref: source_ref.into(),
            message: message.into(),
        }
    }

    /// Creates a metadata error.
    #[must_use]
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: message.into(),
        }
    }
}

impl ValuesError {
    /// Creates a parse error.
    #[must_use]
    pub fn parse(source_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_ref: source_ref.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid assignment error for a flag.
    #[must_use]
    pub fn invalid_key(flag: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            flag,
            message: message.into(),
        }
    }
}
