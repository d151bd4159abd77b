//! Manifest handling for chartdiff.
//!
//! This module provides:
//! - Document splitting and removal of sensitive kinds
//! - Retrieval of the deployed manifest of a release

mod fetch;
mod filter;

pub use fetch::{DeployedManifest, ReleaseFetcher};
pub use filter::{
    document_kind, remove_kind, remove_secrets, split_documents, DOCUMENT_DELIMITER, SECRET_KIND,
};
