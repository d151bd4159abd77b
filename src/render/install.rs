//! Client-only install simulation.
//!
//! The installer never talks to a cluster. It renders the chart with the
//! merged values and assembles the manifest an install would apply.

use serde_yaml::Mapping;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chart::Chart;
use crate::error::{DiffError, RenderError, Result};

use super::engine::{
    assemble, crd_manifest, raw_manifest, render_templates, ManifestDocument, ReleaseContext,
};

/// Options for a simulated install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Release name.
    pub release_name: String,
    /// Target namespace.
    pub namespace: String,
    /// Render only, never apply.
    pub dry_run: bool,
    /// Allow reusing the name of an existing release.
    pub replace: bool,
    /// Do not contact a cluster.
    pub client_only: bool,
    /// Leave hooks out of the manifest.
    pub disable_hooks: bool,
    /// Prepend the chart's CRDs to the manifest.
    pub include_crds: bool,
    /// Kubernetes version exposed to templates.
    pub kube_version: String,
}

impl InstallOptions {
    /// Options used to preview an upgrade.
    #[must_use]
    pub fn preview(
        release_name: impl Into<String>,
        namespace: impl Into<String>,
        kube_version: impl Into<String>,
    ) -> Self {
        Self {
            release_name: release_name.into(),
            namespace: namespace.into(),
            dry_run: true,
            replace: true,
            client_only: true,
            disable_hooks: true,
            include_crds: false,
            kube_version: kube_version.into(),
        }
    }

    /// Sets whether CRDs are included.
    #[must_use]
    pub const fn with_include_crds(mut self, include_crds: bool) -> Self {
        self.include_crds = include_crds;
        self
    }
}

/// A release as an install would create it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRelease {
    /// Release name.
    pub name: String,
    /// Target namespace.
    pub namespace: String,
    /// Name of the rendered chart.
    pub chart_name: String,
    /// Version of the rendered chart.
    pub chart_version: String,
    /// The rendered manifest, without hooks.
    pub manifest: String,
    /// Hook documents set aside from the manifest.
    pub hooks: Vec<ManifestDocument>,
}

/// A failed render, with whatever output was produced.
#[derive(Debug)]
pub struct RenderFailure {
    /// What went wrong.
    pub error: DiffError,
    /// The partially rendered release, when rendering got far enough.
    pub partial: Option<RenderedRelease>,
}

impl From<DiffError> for RenderFailure {
    fn from(error: DiffError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

/// Outcome of a render.
pub type RenderResult = std::result::Result<RenderedRelease, RenderFailure>;

/// Renders charts the way an install would, without applying anything.
#[derive(Debug, Clone)]
pub struct DryRunInstaller {
    options: InstallOptions,
}

impl DryRunInstaller {
    /// Creates an installer.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Unsupported` unless `dry_run`, `client_only`,
    /// `replace` and `disable_hooks` are all set. Without a cluster the
    /// installer can neither check that the name is free nor run hooks.
    pub fn new(options: InstallOptions) -> Result<Self> {
        let refused = if !options.dry_run || !options.client_only {
            Some("only client-only dry-run installs are supported")
        } else if !options.replace {
            Some("a client-only install cannot check whether the release name is in use")
        } else if !options.disable_hooks {
            Some("hooks cannot run in a client-only install")
        } else {
            None
        };

        if let Some(message) = refused {
            return Err(RenderError::Unsupported {
                message: message.to_string(),
            }
            .into());
        }
        Ok(Self { options })
    }

    /// Options in use.
    #[must_use]
    pub const fn options(&self) -> &InstallOptions {
        &self.options
    }

    /// Renders the chart with the given values.
    ///
    /// A template failure returns no partial release. A document that is
    /// not valid YAML returns the partial release holding every rendered
    /// template.
    pub async fn run(&self, chart: &Chart, values: &Mapping, token: &CancellationToken) -> RenderResult {
        info!(
            "Rendering {} {} as release {}",
            chart.name(),
            chart.metadata.version,
            self.options.release_name
        );

        let context = ReleaseContext {
            name: self.options.release_name.clone(),
            namespace: self.options.namespace.clone(),
            revision: 1,
            kube_version: self.options.kube_version.clone(),
        };

        let templates = render_templates(chart, values, &context, token).await?;

        let assembled = match assemble(&templates) {
            Ok(assembled) => assembled,
            Err(error) => {
                return Err(RenderFailure {
                    error,
                    partial: Some(self.release(chart, raw_manifest(&templates), Vec::new())),
                });
            }
        };

        let mut manifest = String::new();
        if self.options.include_crds {
            manifest.push_str(&crd_manifest(chart));
        }
        manifest.push_str(&assembled.manifest());

        let hooks = assembled.hooks;
        debug!(
            "Rendered {} documents and {} hooks",
            assembled.documents.len(),
            hooks.len()
        );
        Ok(self.release(chart, manifest, hooks))
    }

    fn release(&self, chart: &Chart, manifest: String, hooks: Vec<ManifestDocument>) -> RenderedRelease {
        RenderedRelease {
            name: self.options.release_name.clone(),
            namespace: self.options.namespace.clone(),
            chart_name: chart.name().to_string(),
            chart_version: chart.metadata.version.clone(),
            manifest,
            hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartFile, ChartMetadata};

    fn chart(templates: &[(&str, &str)]) -> Chart {
        Chart {
            metadata: ChartMetadata {
                api_version: String::from("v2"),
                name: String::from("web"),
                version: String::from("1.2.0"),
                ..ChartMetadata::default()
            },
            templates: templates
                .iter()
                .map(|(name, data)| ChartFile {
                    name: (*name).to_string(),
                    data: (*data).to_string(),
                })
                .collect(),
            crds: vec![ChartFile {
                name: String::from("crds/widget.yaml"),
                data: String::from("kind: CustomResourceDefinition\n"),
            }],
            ..Chart::default()
        }
    }

    fn installer() -> DryRunInstaller {
        DryRunInstaller::new(InstallOptions::preview("myapp", "prod", "v1.30.0")).expect("installer")
    }

    #[test]
    fn test_preview_options() {
        let options = InstallOptions::preview("myapp", "prod", "v1.30.0");
        assert!(options.dry_run);
        assert!(options.replace);
        assert!(options.client_only);
        assert!(options.disable_hooks);
        assert!(!options.include_crds);
    }

    #[test]
    fn test_refuses_real_install() {
        let mut options = InstallOptions::preview("myapp", "prod", "v1.30.0");
        options.dry_run = false;
        assert!(DryRunInstaller::new(options).is_err());

        let mut options = InstallOptions::preview("myapp", "prod", "v1.30.0");
        options.client_only = false;
        let err = DryRunInstaller::new(options).expect_err("cluster access");
        assert!(matches!(err, DiffError::Render(RenderError::Unsupported { .. })));
    }

    #[test]
    fn test_refuses_hooks_and_name_checks() {
        let mut options = InstallOptions::preview("myapp", "prod", "v1.30.0");
        options.disable_hooks = false;
        let err = DryRunInstaller::new(options).expect_err("hooks");
        assert!(err.to_string().contains("hooks cannot run"));

        let mut options = InstallOptions::preview("myapp", "prod", "v1.30.0");
        options.replace = false;
        let err = DryRunInstaller::new(options).expect_err("name check");
        assert!(matches!(err, DiffError::Render(RenderError::Unsupported { .. })));
        assert!(err.to_string().contains("release name is in use"));
    }

    #[tokio::test]
    async fn test_renders_manifest_without_hooks_or_crds() {
        let chart = chart(&[
            ("templates/cm.yaml", "kind: ConfigMap\nmetadata:\n  name: {{ release.name }}\n"),
            (
                "templates/hook.yaml",
                "kind: Job\nmetadata:\n  annotations:\n    helm.sh/hook: pre-install\n",
            ),
        ]);

        let release = installer()
            .run(&chart, &Mapping::new(), &CancellationToken::new())
            .await
            .expect("render");

        assert_eq!(
            release.manifest,
            "---\n# Source: web/templates/cm.yaml\nkind: ConfigMap\nmetadata:\n  name: myapp\n"
        );
        assert_eq!(release.hooks.len(), 1);
        assert_eq!(release.chart_version, "1.2.0");
    }

    #[tokio::test]
    async fn test_include_crds() {
        let chart = chart(&[("templates/cm.yaml", "kind: ConfigMap\n")]);
        let installer = DryRunInstaller::new(
            InstallOptions::preview("myapp", "prod", "v1.30.0").with_include_crds(true),
        )
        .expect("installer");

        let release = installer
            .run(&chart, &Mapping::new(), &CancellationToken::new())
            .await
            .expect("render");

        assert!(release
            .manifest
            .starts_with("---\n# Source: web/crds/widget.yaml\nkind: CustomResourceDefinition\n"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_returns_partial() {
        let chart = chart(&[
            ("templates/a.yaml", "kind: ConfigMap\n"),
            ("templates/b.yaml", "kind: [broken\n"),
        ]);

        let failure = installer()
            .run(&chart, &Mapping::new(), &CancellationToken::new())
            .await
            .expect_err("invalid yaml");

        assert!(matches!(failure.error, DiffError::Render(RenderError::InvalidYaml { .. })));
        let partial = failure.partial.expect("partial");
        assert!(partial.manifest.contains("# Source: web/templates/a.yaml"));
        assert!(partial.manifest.contains("kind: [broken"));
    }

    #[tokio::test]
    async fn test_template_error_has_no_partial() {
        let chart = chart(&[("templates/a.yaml", "{% if %}")]);

        let failure = installer()
            .run(&chart, &Mapping::new(), &CancellationToken::new())
            .await
            .expect_err("template error");

        assert!(failure.partial.is_none());
    }
}
