//! Values merging.
//!
//! Values come from four sources, applied in a fixed order: values files
//! (left to right), `--set`, `--set-string`, then `--set-file`. A later
//! source overrides an earlier one on key conflict; maps merge recursively.

use reqwest::Client;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ValuesError};

use super::strvals::{self, ValueKind};

/// Timeout for fetching remote values files.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Values sources collected from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueOptions {
    /// Values files or URLs.
    pub value_files: Vec<String>,
    /// `--set` assignments.
    pub values: Vec<String>,
    /// `--set-string` assignments.
    pub string_values: Vec<String>,
    /// `--set-file` assignments.
    pub file_values: Vec<String>,
}

/// Reads values files from disk or over HTTP.
#[derive(Debug, Clone)]
pub struct ValuesFetcher {
    /// HTTP client for remote files.
    client: Client,
}

impl ValuesFetcher {
    /// Creates a fetcher with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| ValuesError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Returns the contents of a values file or URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the URL fetched.
    pub async fn read(&self, location: &str) -> Result<String> {
        if is_url(location) {
            debug!("Fetching values from {location}");
            let fetch_error = |e: reqwest::Error| ValuesError::Fetch {
                url: location.to_string(),
                message: e.to_string(),
            };
            let response = self
                .client
                .get(location)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(fetch_error)?;
            return Ok(response.text().await.map_err(fetch_error)?);
        }

        debug!("Reading values from {location}");
        tokio::fs::read_to_string(location).await.map_err(|e| {
            ValuesError::FileRead {
                path: PathBuf::from(location),
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl ValueOptions {
    /// Merges every source into one values tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or an assignment
    /// is malformed.
    pub async fn merge_values(&self, fetcher: &ValuesFetcher) -> Result<Mapping> {
        let mut base = Mapping::new();

        for location in &self.value_files {
            let content = fetcher.read(location).await?;
            let current = parse_values(&content, location)?;
            base = merge_maps(base, current);
        }

        for assignment in &self.values {
            strvals::parse_into(assignment, &mut base, ValueKind::Typed)
                .map_err(|message| ValuesError::invalid_key("set", message))?;
        }

        for assignment in &self.string_values {
            strvals::parse_into(assignment, &mut base, ValueKind::String)
                .map_err(|message| ValuesError::invalid_key("set-string", message))?;
        }

        for assignment in &self.file_values {
            strvals::parse_file_into(assignment, &mut base, |path| {
                std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))
            })
            .map_err(|message| ValuesError::invalid_key("set-file", message))?;
        }

        Ok(base)
    }
}

/// Parses a values document. An empty document is an empty map.
///
/// # Errors
///
/// Returns an error if the document is not YAML or not a map.
pub fn parse_values(content: &str, source_ref: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(content)
        .map_err(|e| ValuesError::parse(source_ref, e.to_string()))?;

    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(ValuesError::parse(
            source_ref,
            format!("expected a map, found {}", type_name(&other)),
        )
        .into()),
    }
}

/// Deep-merges `overlay` into `base`; `overlay` wins on conflicts.
#[must_use]
pub fn merge_maps(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                let current = std::mem::take(existing);
                *existing = merge_maps(current, incoming);
                continue;
            }
            (_, incoming) => incoming,
        };
        base.insert(key, value);
    }
    base
}

/// Returns true if `location` is an HTTP(S) URL.
#[must_use]
pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Describes a YAML value type for error messages.
const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a map",
        Value::Tagged(_) => "a tagged value",
    }
}
