//! Chart types.
//!
//! A chart is a bundle of templates, default values and metadata. Charts may
//! embed other charts under `charts/`; those become [`Chart::dependencies`].

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::{ChartError, Result};

/// The chart type that can be installed.
pub const APPLICATION_TYPE: &str = "application";

/// Contents of `Chart.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (`v1` or `v2`).
    #[serde(default)]
    pub api_version: String,
    /// Chart name.
    #[serde(default)]
    pub name: String,
    /// Chart version.
    #[serde(default)]
    pub version: String,
    /// Version of the packaged application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Chart type; empty means application.
    #[serde(default, rename = "type")]
    pub chart_type: String,
    /// Whether the chart is deprecated.
    #[serde(default)]
    pub deprecated: bool,
    /// Declared dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// A declared chart dependency.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the dependency chart.
    pub name: String,
    /// Version constraint.
    #[serde(default)]
    pub version: String,
    /// Repository the dependency comes from.
    #[serde(default)]
    pub repository: String,
    /// Name the dependency is rendered under, if different.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Dotted values path that enables the dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A template or CRD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFile {
    /// Path relative to the chart root, with `/` separators.
    pub name: String,
    /// File contents.
    pub data: String,
}

/// A loaded chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chart {
    /// Chart metadata.
    pub metadata: ChartMetadata,
    /// Default values from `values.yaml`.
    pub values: Mapping,
    /// Files under `templates/`, sorted by path.
    pub templates: Vec<ChartFile>,
    /// Files under `crds/`, sorted by path.
    pub crds: Vec<ChartFile>,
    /// Charts embedded under `charts/`.
    pub dependencies: Vec<Self>,
}

impl Dependency {
    /// Key under which the dependency reads its values.
    #[must_use]
    pub fn values_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl Chart {
    /// Chart name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns true if the chart is marked deprecated.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.metadata.deprecated
    }

    /// Checks that the chart type can be installed.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::UninstallableType` for any type other than
    /// `application` or empty.
    pub fn check_installable(&self) -> Result<()> {
        match self.metadata.chart_type.as_str() {
            "" | APPLICATION_TYPE => Ok(()),
            other => Err(ChartError::UninstallableType {
                chart_type: other.to_string(),
            }
            .into()),
        }
    }

    /// Validates required metadata fields.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::InvalidMetadata` naming the first missing field.
    pub fn validate_metadata(&self) -> Result<()> {
        let required = [
            ("apiVersion", &self.metadata.api_version),
            ("name", &self.metadata.name),
            ("version", &self.metadata.version),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ChartError::metadata(format!(
                    "chart.metadata.{field} is required"
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Checks that every declared dependency is present in `charts/`.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::MissingDependencies` listing the absent ones.
    pub fn check_dependencies(&self) -> Result<()> {
        let missing: Vec<String> = self
            .metadata
            .dependencies
            .iter()
            .filter(|dep| !self.dependencies.iter().any(|c| c.name() == dep.name))
            .map(|dep| dep.name.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChartError::MissingDependencies { names: missing }.into())
        }
    }

    /// Finds the declaration of an embedded chart, if any.
    #[must_use]
    pub fn dependency_for(&self, subchart: &Self) -> Option<&Dependency> {
        self.metadata
            .dependencies
            .iter()
            .find(|dep| dep.name == subchart.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;

    fn chart(chart_type: &str) -> Chart {
        Chart {
            metadata: ChartMetadata {
                api_version: String::from("v2"),
                name: String::from("web"),
                version: String::from("1.0.0"),
                chart_type: chart_type.to_string(),
                ..ChartMetadata::default()
            },
            ..Chart::default()
        }
    }

    #[test]
    fn test_installable_types() {
        assert!(chart("").check_installable().is_ok());
        assert!(chart("application").check_installable().is_ok());

        let err = chart("library").check_installable().expect_err("library");
        assert!(matches!(
            err,
            DiffError::Chart(ChartError::UninstallableType { ref chart_type }) if chart_type == "library"
        ));
    }

    #[test]
    fn test_metadata_parsing() {
        let metadata: ChartMetadata = serde_yaml::from_str(
            "apiVersion: v2\nname: web\nversion: 0.1.0\ntype: library\ndeprecated: true\ndependencies:\n  - name: redis\n    alias: cache\n    condition: cache.enabled\n",
        )
        .expect("parse");

        assert_eq!(metadata.chart_type, "library");
        assert!(metadata.deprecated);
        assert_eq!(metadata.dependencies[0].values_key(), "cache");
    }

    #[test]
    fn test_validate_metadata() {
        assert!(chart("").validate_metadata().is_ok());

        let mut missing = chart("");
        missing.metadata.version.clear();
        let err = missing.validate_metadata().expect_err("missing version");
        assert!(err.to_string().contains("chart.metadata.version is required"));
    }

    #[test]
    fn test_check_dependencies() {
        let mut parent = chart("");
        parent.metadata.dependencies = vec![
            Dependency {
                name: String::from("redis"),
                ..Dependency::default()
            },
            Dependency {
                name: String::from("postgresql"),
                ..Dependency::default()
            },
        ];

        let mut redis = chart("");
        redis.metadata.name = String::from("redis");
        parent.dependencies.push(redis);

        let err = parent.check_dependencies().expect_err("missing");
        assert!(matches!(
            err,
            DiffError::Chart(ChartError::MissingDependencies { ref names }) if names == &["postgresql"]
        ));
    }
}
