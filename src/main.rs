//! chartdiff CLI entrypoint.
//!
//! This is the main entrypoint for the chartdiff command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use chartdiff::cli::{write_diff, Cli, Commands, DiffArgs};
use chartdiff::config::Settings;
use chartdiff::diff::DiffStyle;
use chartdiff::error::{DiffError, Result};
use chartdiff::pipeline::{DiffPipeline, DiffRequest};
use chartdiff::release::{open_store, ReleaseStore};

use clap::{CommandFactory, Parser};
use tracing::{debug, error};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle for raising the log level once settings are known.
type LogHandle = reload::Handle<EnvFilter, Registry>;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_handle = init_logging(cli.debug);

    if let Err(e) = Settings::load_dotenv(Path::new(".")) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings.with_debug(cli.debug),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // CHARTDIFF_DEBUG may only be known after the environment is loaded
    if settings.debug && !cli.debug {
        if let Err(e) = log_handle.reload(log_filter(true)) {
            eprintln!("Failed to raise log level: {e}");
        }
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let Commands::Diff(args) = &cli.command;
    if !args.has_valid_arity() {
        print_diff_help();
        return ExitCode::FAILURE;
    }

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cmd_diff(&settings, args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_cancellation() => {
            debug!("{e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            if let Some(partial) = e.partial_manifest() {
                eprintln!("{partial}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(debug: bool) -> LogHandle {
    let (filter, handle) = reload::Layer::new(log_filter(debug));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    handle
}

/// `RUST_LOG` when set, otherwise `debug` or `warn`.
fn log_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

const fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

/// Prints the help of the `diff` subcommand on stderr.
fn print_diff_help() {
    let mut command = Cli::command();
    if let Some(diff) = command.find_subcommand_mut("diff") {
        let help = diff.render_help();
        eprintln!("{help}");
    }
}

/// Show the manifest diff of an upgrade.
async fn cmd_diff(settings: &Settings, args: &DiffArgs) -> Result<()> {
    let release = args
        .release()
        .ok_or_else(|| DiffError::internal("release name is required"))?;
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| settings.namespace.clone());

    let store = open_store(settings, &namespace);
    debug!("Using {} release driver", store.driver_name());

    let request = DiffRequest {
        release: release.to_string(),
        chart: args.chart().map(str::to_string),
        namespace,
        values: args.value_options(),
    };

    let outcome = DiffPipeline::new(settings, &store)?.run(&request).await?;

    let mut stdout = std::io::stdout().lock();
    write_diff(&mut stdout, &outcome.diff, DiffStyle::detect())?;
    stdout.flush()?;

    Ok(())
}
