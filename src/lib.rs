// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # chartdiff
//!
//! Preview the manifest changes a chart upgrade would make to a deployed
//! release, without touching the cluster.
//!
//! ## Overview
//!
//! A diff run compares two manifests:
//!
//! 1. **Deployed**: the manifest of the last revision of the release
//! 2. **Candidate**: the manifest a dry-run install of the chart renders
//!
//! `Secret` documents are removed from both sides, then a character-level
//! diff is printed.
//!
//! ## Modules
//!
//! - [`release`]: Release storage backends (file, memory)
//! - [`chart`]: Chart location and loading
//! - [`config`]: Settings and values merging
//! - [`manifest`]: Document filtering and deployed manifest retrieval
//! - [`render`]: Dry-run rendering and signal cancellation
//! - [`diff`]: Text diff and pretty printing
//! - [`pipeline`]: The diff run
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```text
//! chartdiff diff myapp ./charts/web -n prod -f prod.yaml --set image.tag=1.4.2
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod chart;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod release;
pub mod render;

// ============================================================================
// Re-exports
// ============================================================================

pub use chart::{Chart, ChartLoader, ChartSource};
pub use cli::{Cli, Commands, DiffArgs};
pub use config::{Settings, StorageDriver, ValueOptions};
pub use diff::{DiffOp, DiffSpan, DiffStyle, ManifestDiff};
pub use error::{DiffError, Result};
pub use manifest::{remove_secrets, ReleaseFetcher};
pub use pipeline::{DiffOutcome, DiffPipeline, DiffRequest};
pub use release::{open_store, FileReleaseStore, MemoryReleaseStore, Release, ReleaseStore};
pub use render::{CancellationController, DryRunInstaller, InstallOptions, RenderedRelease};
