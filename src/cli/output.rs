//! Output formatting for CLI commands.
//!
//! The diff goes to stdout. Warnings and notices go to stderr so they never
//! mix with the diff.

use colored::Colorize;
use std::io::{self, Write};

use crate::diff::{DiffStyle, ManifestDiff};

/// Formats a warning line.
#[must_use]
pub fn format_warning(message: &str) -> String {
    format!("{} {message}", "WARNING:".yellow().bold())
}

/// Prints a warning on stderr.
pub fn warning(message: &str) {
    eprintln!("{}", format_warning(message));
}

/// Writes the pretty diff followed by a newline.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_diff<W: Write>(out: &mut W, diff: &ManifestDiff, style: DiffStyle) -> io::Result<()> {
    writeln!(out, "{}", diff.pretty(style))
}
