//! CLI command definitions.
//!
//! This module defines the CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};

use crate::config::ValueOptions;

/// chartdiff - Preview the manifest changes of a release upgrade.
#[derive(Parser, Debug)]
#[command(name = "chartdiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug output, including invalid rendered YAML.
    ///
    /// Also enabled by `CHARTDIFF_DEBUG`.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the manifest changes an upgrade would make.
    Diff(DiffArgs),
}

/// Arguments of `chartdiff diff`.
#[derive(Args, Debug, Clone, Default)]
pub struct DiffArgs {
    /// RELEASE [CHART]
    #[arg(value_name = "RELEASE [CHART]", num_args = 0..)]
    pub args: Vec<String>,

    /// Namespace of the release.
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Values files or URLs (can be repeated or comma separated).
    #[arg(short = 'f', long = "values", value_delimiter = ',')]
    pub value_files: Vec<String>,

    /// Set values on the command line (key1=val1,key2=val2).
    #[arg(long = "set")]
    pub values: Vec<String>,

    /// Set string values on the command line (key1=val1,key2=val2).
    #[arg(long = "set-string")]
    pub string_values: Vec<String>,

    /// Set values from files (key1=path1,key2=path2).
    #[arg(long = "set-file")]
    pub file_values: Vec<String>,
}

impl DiffArgs {
    /// Returns true when one or two positionals were given.
    #[must_use]
    pub fn has_valid_arity(&self) -> bool {
        (1..=2).contains(&self.args.len())
    }

    /// Release name.
    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Chart reference, when given.
    #[must_use]
    pub fn chart(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }

    /// Values sources in precedence order.
    #[must_use]
    pub fn value_options(&self) -> ValueOptions {
        ValueOptions {
            value_files: self.value_files.clone(),
            values: self.values.clone(),
            string_values: self.string_values.clone(),
            file_values: self.file_values.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_args(argv: &[&str]) -> DiffArgs {
        let cli = Cli::try_parse_from(argv).expect("parse");
        match cli.command {
            Commands::Diff(args) => args,
        }
    }

    #[test]
    fn test_parses_release_and_chart() {
        let args = diff_args(&["chartdiff", "diff", "myapp", "./web", "-n", "prod"]);

        assert!(args.has_valid_arity());
        assert_eq!(args.release(), Some("myapp"));
        assert_eq!(args.chart(), Some("./web"));
        assert_eq!(args.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_positional_arity() {
        assert!(!diff_args(&["chartdiff", "diff"]).has_valid_arity());
        assert!(diff_args(&["chartdiff", "diff", "myapp"]).has_valid_arity());
        assert!(!diff_args(&["chartdiff", "diff", "a", "b", "c"]).has_valid_arity());
    }

    #[test]
    fn test_values_flags() {
        let args = diff_args(&[
            "chartdiff",
            "diff",
            "myapp",
            "-f",
            "a.yaml,b.yaml",
            "--values",
            "c.yaml",
            "--set",
            "x=1",
            "--set-string",
            "y=2",
            "--set-file",
            "z=cfg.txt",
        ]);

        let options = args.value_options();
        assert_eq!(options.value_files, vec!["a.yaml", "b.yaml", "c.yaml"]);
        assert_eq!(options.values, vec!["x=1"]);
        assert_eq!(options.string_values, vec!["y=2"]);
        assert_eq!(options.file_values, vec!["z=cfg.txt"]);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["chartdiff", "diff", "myapp", "--debug", "--no-color"])
            .expect("parse");
        assert!(cli.debug);
        assert!(cli.no_color);
    }
}
