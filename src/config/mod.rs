//! Configuration module for chartdiff.
//!
//! This module handles all configuration-related functionality:
//! - Process-wide settings read once from the environment
//! - Values merging from files, URLs and `--set` style flags

mod settings;
mod strvals;
mod values;

pub use settings::{
    Settings, StorageDriver, ENV_DEBUG, ENV_DRIVER, ENV_KUBE_VERSION, ENV_NAMESPACE,
    ENV_REPOSITORY_CACHE, ENV_STORAGE_PATH,
};
pub use strvals::{parse_file_into, parse_into, ValueKind};
pub use values::{is_url, merge_maps, parse_values, ValueOptions, ValuesFetcher};
