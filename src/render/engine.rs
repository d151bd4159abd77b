//! Template rendering and manifest assembly.
//!
//! Templates are Jinja templates evaluated with `minijinja`. Each chart in
//! the dependency tree gets its own environment, so `{% include %}` only
//! sees the chart's own partials. The rendered files are then split into
//! documents, hooks are set aside, and the rest are ordered the way an
//! install would apply them.

use base64::Engine as _;
use minijinja::{context, Environment, Error as TemplateError, ErrorKind, Value};
use serde::Deserialize;
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::chart::{Chart, ChartFile};
use crate::config::merge_maps;
use crate::error::{DiffError, RenderError, Result};

/// Annotation marking a document as a lifecycle hook.
pub const HOOK_ANNOTATION: &str = "helm.sh/hook";

/// Template file that is never rendered into the manifest.
const NOTES_FILE: &str = "NOTES.txt";

/// Service name exposed to templates as `release.service`.
const RELEASE_SERVICE: &str = "chartdiff";

/// Kinds in the order an install applies them.
const INSTALL_ORDER: &[&str] = &[
    "Namespace",
    "NetworkPolicy",
    "ResourceQuota",
    "LimitRange",
    "PodSecurityPolicy",
    "PodDisruptionBudget",
    "ServiceAccount",
    "Secret",
    "SecretList",
    "ConfigMap",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleList",
    "ClusterRoleBinding",
    "ClusterRoleBindingList",
    "Role",
    "RoleList",
    "RoleBinding",
    "RoleBindingList",
    "Service",
    "DaemonSet",
    "Pod",
    "ReplicationController",
    "ReplicaSet",
    "Deployment",
    "HorizontalPodAutoscaler",
    "StatefulSet",
    "Job",
    "CronJob",
    "IngressClass",
    "Ingress",
    "APIService",
];

/// Release information exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseContext {
    /// Release name.
    pub name: String,
    /// Target namespace.
    pub namespace: String,
    /// Revision being rendered.
    pub revision: u32,
    /// Kubernetes version exposed as `capabilities.kube_version`.
    pub kube_version: String,
}

/// Output of one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    /// Path of the template, prefixed with the chart path.
    pub name: String,
    /// Rendered text.
    pub content: String,
}

/// One document of the rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Template the document came from.
    pub source: String,
    /// Document kind, empty when absent.
    pub kind: String,
    /// `metadata.name`, empty when absent.
    pub name: String,
    /// Hook events, when the document is a hook.
    pub hook: Option<String>,
    /// Trimmed document text.
    pub content: String,
}

/// A manifest split into installable documents and hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledManifest {
    /// Installable documents, in install order.
    pub documents: Vec<ManifestDocument>,
    /// Hook documents, in template order.
    pub hooks: Vec<ManifestDocument>,
}

/// Fields read from a rendered document.
#[derive(Debug, Default, Deserialize)]
struct Head {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<HeadMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct HeadMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    annotations: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// A chart of the dependency tree with the values it renders with.
struct ScopedChart<'a> {
    chart: &'a Chart,
    values: Mapping,
    path: String,
}

/// Renders every template of a chart tree.
///
/// The token is checked before each template; a cancelled token stops the
/// render with [`DiffError::Cancelled`].
///
/// # Errors
///
/// Returns the first template error, or the cancellation.
pub async fn render_templates(
    chart: &Chart,
    values: &Mapping,
    release: &ReleaseContext,
    token: &CancellationToken,
) -> Result<Vec<RenderedTemplate>> {
    let top_values = merge_maps(chart.values.clone(), values.clone());
    let mut scoped = Vec::new();
    collect_charts(chart, top_values, chart.name().to_string(), &mut scoped);

    let mut rendered = Vec::new();
    for scope in &scoped {
        let env = build_environment(scope.chart)?;
        let ctx = context! {
            values => Value::from_serialize(&scope.values),
            release => context! {
                name => &release.name,
                namespace => &release.namespace,
                service => RELEASE_SERVICE,
                revision => release.revision,
                is_install => true,
                is_upgrade => false,
            },
            chart => Value::from_serialize(&scope.chart.metadata),
            capabilities => context! { kube_version => &release.kube_version },
        };

        for template in scope.chart.templates.iter().filter(|t| is_rendered(t)) {
            tokio::task::yield_now().await;
            if token.is_cancelled() {
                debug!("Render cancelled before {}", template.name);
                return Err(DiffError::cancelled(&release.name));
            }

            let full_name = format!("{}/{}", scope.path, template.name);
            trace!("Rendering {full_name}");
            let content = env
                .get_template(&template.name)
                .and_then(|t| t.render(&ctx))
                .map_err(|e| template_error(&full_name, &e))?;

            rendered.push(RenderedTemplate {
                name: full_name,
                content,
            });
        }
    }

    Ok(rendered)
}

/// Concatenates rendered templates with source headers, without parsing.
#[must_use]
pub fn raw_manifest(templates: &[RenderedTemplate]) -> String {
    templates
        .iter()
        .map(|t| format!("---\n# Source: {}\n{}\n", t.name, t.content))
        .collect()
}

/// Splits rendered templates into documents, separates hooks and orders
/// the rest by kind.
///
/// # Errors
///
/// Returns `RenderError::InvalidYaml` for the first document that does not
/// parse.
pub fn assemble(templates: &[RenderedTemplate]) -> Result<AssembledManifest> {
    let mut assembled = AssembledManifest::default();

    for template in templates {
        for content in split_yaml_documents(&template.content) {
            let value: serde_yaml::Value =
                serde_yaml::from_str(&content).map_err(|e| RenderError::InvalidYaml {
                    name: template.name.clone(),
                    message: e.to_string(),
                })?;
            if value.is_null() {
                continue;
            }

            let head: Head = serde_yaml::from_value(value).unwrap_or_default();
            let metadata = head.metadata.unwrap_or_default();
            let hook = metadata
                .annotations
                .and_then(|annotations| {
                    annotations
                        .get(HOOK_ANNOTATION)
                        .and_then(serde_yaml::Value::as_str)
                        .map(str::to_string)
                });

            let document = ManifestDocument {
                source: template.name.clone(),
                kind: head.kind.unwrap_or_default(),
                name: metadata.name.unwrap_or_default(),
                hook,
                content,
            };

            if document.hook.is_some() {
                assembled.hooks.push(document);
            } else {
                assembled.documents.push(document);
            }
        }
    }

    assembled.documents.sort_by(|a, b| install_rank(&a.kind).cmp(&install_rank(&b.kind)));
    Ok(assembled)
}

impl AssembledManifest {
    /// Renders the installable documents as a manifest.
    #[must_use]
    pub fn manifest(&self) -> String {
        self.documents
            .iter()
            .map(|d| format!("---\n# Source: {}\n{}\n", d.source, d.content))
            .collect()
    }
}

/// Formats CRD files as manifest documents.
#[must_use]
pub fn crd_manifest(chart: &Chart) -> String {
    chart
        .crds
        .iter()
        .map(|crd| format!("---\n# Source: {}/{}\n{}\n", chart.name(), crd.name, crd.data.trim()))
        .collect()
}

/// Sort key: position in the install order, then unknown kinds by name.
fn install_rank(kind: &str) -> (usize, &str) {
    INSTALL_ORDER
        .iter()
        .position(|known| *known == kind)
        .map_or((INSTALL_ORDER.len(), kind), |index| (index, ""))
}

/// Splits rendered text on `---` separator lines, dropping blank documents.
fn split_yaml_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let is_separator = line
            .strip_prefix("---")
            .is_some_and(|rest| rest.trim().is_empty());
        if is_separator {
            documents.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents.push(current);

    documents
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Walks the dependency tree, scoping values for each enabled subchart.
fn collect_charts<'a>(chart: &'a Chart, values: Mapping, path: String, out: &mut Vec<ScopedChart<'a>>) {
    let globals = values.get("global").and_then(serde_yaml::Value::as_mapping).cloned();
    let mut enabled = Vec::new();

    for subchart in &chart.dependencies {
        let dependency = chart.dependency_for(subchart);
        let key = dependency.map_or_else(|| subchart.name(), |d| d.values_key());

        if let Some(condition) = dependency.and_then(|d| d.condition.as_deref()) {
            if lookup_path(&values, condition).and_then(serde_yaml::Value::as_bool) == Some(false) {
                debug!("Skipping disabled subchart {key} ({condition} is false)");
                continue;
            }
        }

        let own = values
            .get(key)
            .and_then(serde_yaml::Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let mut sub_values = merge_maps(subchart.values.clone(), own);

        if let Some(globals) = &globals {
            let sub_globals = sub_values
                .get("global")
                .and_then(serde_yaml::Value::as_mapping)
                .cloned()
                .unwrap_or_default();
            sub_values.insert(
                serde_yaml::Value::from("global"),
                serde_yaml::Value::Mapping(merge_maps(sub_globals, globals.clone())),
            );
        }

        enabled.push((subchart, sub_values, format!("{path}/charts/{key}")));
    }

    out.push(ScopedChart { chart, values, path });
    for (subchart, sub_values, sub_path) in enabled {
        collect_charts(subchart, sub_values, sub_path, out);
    }
}

/// Looks up a dotted path in a values tree.
fn lookup_path<'v>(values: &'v Mapping, path: &str) -> Option<&'v serde_yaml::Value> {
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = current.as_mapping()?.get(segment)?;
    }
    Some(current)
}

/// Returns true for templates that produce manifest output.
fn is_rendered(template: &ChartFile) -> bool {
    let base = template.name.rsplit('/').next().unwrap_or(&template.name);
    !base.starts_with('_') && base != NOTES_FILE
}

/// Creates an environment holding every template of one chart.
fn build_environment(chart: &Chart) -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_filter("toyaml", to_yaml);
    env.add_filter("quote", quote);
    env.add_filter("b64encode", b64encode);
    env.add_filter("nindent", nindent);

    for template in &chart.templates {
        env.add_template_owned(template.name.clone(), template.data.clone())
            .map_err(|e| template_error(&format!("{}/{}", chart.name(), template.name), &e))?;
    }
    Ok(env)
}

/// Converts a template error.
fn template_error(name: &str, error: &TemplateError) -> DiffError {
    RenderError::Template {
        name: name.to_string(),
        message: error.to_string(),
    }
    .into()
}

/// `toyaml` filter.
fn to_yaml(value: Value) -> std::result::Result<String, TemplateError> {
    serde_yaml::to_string(&value)
        .map(|s| s.trim_end().to_string())
        .map_err(|e| TemplateError::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// `quote` filter.
fn quote(value: Value) -> String {
    format!("\"{value}\"")
}

/// `b64encode` filter.
fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

/// `nindent` filter: newline, then every line indented by `width` spaces.
fn nindent(value: String, width: usize) -> String {
    let pad = " ".repeat(width);
    let indented: Vec<String> = value.lines().map(|line| format!("{pad}{line}")).collect();
    format!("\n{}", indented.join("\n"))
}
