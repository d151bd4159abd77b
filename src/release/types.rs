//! Release record types.
//!
//! A release is the stored result of a previous install or upgrade. Only the
//! rendered manifest matters to a diff, but the whole record is kept so the
//! on-disk format stays readable by other tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored release revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Release name.
    pub name: String,
    /// Namespace the release was installed into.
    pub namespace: String,
    /// Revision number, starting at 1.
    pub version: u32,
    /// Deployment information.
    #[serde(default)]
    pub info: ReleaseInfo,
    /// Chart the release was rendered from.
    #[serde(default)]
    pub chart: ChartReference,
    /// Rendered manifest of the release.
    #[serde(default)]
    pub manifest: String,
}

/// Deployment information for a release revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Status of the revision.
    #[serde(default)]
    pub status: ReleaseStatus,
    /// When the first revision was deployed.
    #[serde(default)]
    pub first_deployed: Option<DateTime<Utc>>,
    /// When this revision was deployed.
    #[serde(default)]
    pub last_deployed: Option<DateTime<Utc>>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Status of a release revision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    /// Status not recorded.
    #[default]
    Unknown,
    /// Currently deployed revision.
    Deployed,
    /// Replaced by a later revision.
    Superseded,
    /// Failed to deploy.
    Failed,
    /// Being installed.
    PendingInstall,
    /// Being upgraded.
    PendingUpgrade,
    /// Being rolled back.
    PendingRollback,
}

/// Chart a release was rendered from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartReference {
    /// Chart name.
    #[serde(default)]
    pub name: String,
    /// Chart version.
    #[serde(default)]
    pub version: String,
    /// Reference the chart was installed from, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Release {
    /// Creates a deployed release revision with the given manifest.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        version: u32,
        manifest: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            namespace: namespace.into(),
            version,
            info: ReleaseInfo {
                status: ReleaseStatus::Deployed,
                first_deployed: Some(now),
                last_deployed: Some(now),
                description: String::new(),
            },
            chart: ChartReference::default(),
            manifest: manifest.into(),
        }
    }

    /// Sets the chart the release was rendered from.
    #[must_use]
    pub fn with_chart(mut self, chart: ChartReference) -> Self {
        self.chart = chart;
        self
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
        };
        write!(f, "{s}")
    }
}
