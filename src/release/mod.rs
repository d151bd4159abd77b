//! Release storage for chartdiff.
//!
//! This module provides read access to previously deployed releases,
//! through a driver selected at startup.

mod store;
mod file;
mod memory;
mod types;

pub use store::ReleaseStore;
pub use file::FileReleaseStore;
pub use memory::MemoryReleaseStore;
pub use types::{ChartReference, Release, ReleaseInfo, ReleaseStatus};

#[cfg(test)]
pub use store::MockReleaseStore;

use crate::config::{Settings, StorageDriver};

/// Creates the release store selected by the settings.
#[must_use]
pub fn open_store(settings: &Settings, namespace: &str) -> Box<dyn ReleaseStore> {
    match settings.driver {
        StorageDriver::File => Box::new(FileReleaseStore::new(&settings.storage_path, namespace)),
        StorageDriver::Memory => Box::new(MemoryReleaseStore::new(namespace)),
    }
}
