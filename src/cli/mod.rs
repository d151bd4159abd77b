//! CLI module for chartdiff.
//!
//! This module provides the command-line interface and the helpers that
//! write diffs and warnings to the terminal.

mod commands;
mod output;

pub use commands::{Cli, Commands, DiffArgs};
pub use output::{format_warning, warning, write_diff};
