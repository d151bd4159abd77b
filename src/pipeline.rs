//! The diff pipeline.
//!
//! A run fetches the deployed manifest, renders the candidate chart under
//! the cancellation controller, removes secrets from both sides and diffs
//! them. Nothing is written anywhere.

use tracing::{debug, info};

use crate::chart::ChartLoader;
use crate::cli::warning;
use crate::config::{Settings, ValueOptions, ValuesFetcher};
use crate::diff::ManifestDiff;
use crate::error::{ChartError, DiffError, RenderError, Result};
use crate::manifest::{remove_secrets, ReleaseFetcher};
use crate::release::ReleaseStore;
use crate::render::{CancellationController, DryRunInstaller, InstallOptions, RenderFailure};

/// Hint appended to render errors when the partial manifest is hidden.
pub const DEBUG_HINT: &str = "Use --debug flag to render out invalid YAML";

/// Warning printed for deprecated charts.
pub const DEPRECATED_WARNING: &str = "This chart is deprecated";

/// One diff invocation.
#[derive(Debug, Clone, Default)]
pub struct DiffRequest {
    /// Release to compare against.
    pub release: String,
    /// Chart reference; defaults to the one recorded in the release.
    pub chart: Option<String>,
    /// Namespace of the release.
    pub namespace: String,
    /// Values for the candidate render.
    pub values: ValueOptions,
}

/// Result of a diff run.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// The diff from the deployed to the candidate manifest.
    pub diff: ManifestDiff,
    /// Revision of the deployed release.
    pub deployed_version: u32,
    /// Name of the rendered chart.
    pub chart_name: String,
    /// Version of the rendered chart.
    pub chart_version: String,
}

/// Runs diffs against a release store.
pub struct DiffPipeline<'a, S: ReleaseStore + ?Sized> {
    settings: &'a Settings,
    store: &'a S,
    loader: ChartLoader,
    values: ValuesFetcher,
}

impl<'a, S: ReleaseStore + ?Sized> DiffPipeline<'a, S> {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(settings: &'a Settings, store: &'a S) -> Result<Self> {
        Ok(Self {
            settings,
            store,
            loader: ChartLoader::new(settings)?,
            values: ValuesFetcher::new()?,
        })
    }

    /// Runs a diff, cancelling the render on SIGINT or SIGTERM.
    ///
    /// The signal handlers are only installed while the chart renders. A
    /// signal during the release fetch, chart download or values fetch
    /// terminates the process as usual.
    ///
    /// # Errors
    ///
    /// See [`DiffPipeline::run_with_controller`].
    pub async fn run(&self, request: &DiffRequest) -> Result<DiffOutcome> {
        let controller = CancellationController::new(&request.release).with_os_signals();
        self.run_with_controller(request, controller).await
    }

    /// Runs a diff with the given cancellation controller.
    ///
    /// # Errors
    ///
    /// Returns the first failure: release retrieval, chart location and
    /// loading, an uninstallable chart type, values merging, rendering, or
    /// `DiffError::Cancelled` when a signal arrived during the render.
    pub async fn run_with_controller(
        &self,
        request: &DiffRequest,
        mut controller: CancellationController,
    ) -> Result<DiffOutcome> {
        info!("Diffing release {} in namespace {}", request.release, request.namespace);

        let deployed = ReleaseFetcher::new(self.store).fetch(&request.release).await?;

        let reference = request
            .chart
            .clone()
            .or_else(|| deployed.chart_source.clone())
            .ok_or_else(|| ChartError::NotFound {
                reference: format!("no chart given and release {} records none", request.release),
            })?;

        let source = self.loader.locate(&reference)?;
        let chart = self.loader.load(&source).await?;
        chart.check_installable()?;
        if chart.is_deprecated() {
            warning(DEPRECATED_WARNING);
        }

        let values = request.values.merge_values(&self.values).await?;

        let installer = DryRunInstaller::new(InstallOptions::preview(
            &request.release,
            &request.namespace,
            &self.settings.kube_version,
        ))?;

        let rendered = controller
            .run(|token| async move { installer.run(&chart, &values, &token).await })
            .await
            .map_err(|failure| self.render_error(failure))?;

        let candidate = remove_secrets(rendered.manifest.trim());
        let diff = ManifestDiff::compute(&deployed.manifest, &candidate);
        if diff.is_unchanged() {
            debug!("Release {} has no changes", request.release);
        } else {
            debug!(
                "Diff of {}: {} characters inserted, {} deleted",
                request.release,
                diff.inserted(),
                diff.deleted()
            );
        }

        Ok(DiffOutcome {
            diff,
            deployed_version: deployed.version,
            chart_name: rendered.chart_name,
            chart_version: rendered.chart_version,
        })
    }

    /// Decides how much of a failed render reaches the user.
    fn render_error(&self, failure: RenderFailure) -> DiffError {
        let RenderFailure { error, partial } = failure;
        match partial {
            None => error,
            Some(_) if error.is_cancellation() => error,
            Some(partial) if self.settings.debug => RenderError::Incomplete {
                message: error.to_string(),
                partial_manifest: Some(partial.manifest),
            }
            .into(),
            Some(_) => RenderError::Incomplete {
                message: format!("{error}\n\n{DEBUG_HINT}"),
                partial_manifest: None,
            }
            .into(),
        }
    }
}
