//! Chart module for chartdiff.
//!
//! This module resolves chart references (directories, archives, URLs and
//! `repo/chart` names) and loads them into [`Chart`] values with their
//! embedded dependencies.

mod loader;
mod types;

pub use loader::{ChartLoader, ChartSource};
pub use types::{Chart, ChartFile, ChartMetadata, Dependency, APPLICATION_TYPE};
