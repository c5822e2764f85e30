#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use querylens::cli::app::{Cli, Command, RuntimeArgs};
use querylens::cli::commands;
use querylens::config::RuntimePaths;
use querylens::models::{InputValidationFailure, ReportCommandFailure, ReportEnvelope};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing(cli.runtime.verbose);

    let command_name = cli.command.name();
    info!(command = command_name, "starting");

    match execute(cli) {
        Ok(()) => {
            info!(
                command = command_name,
                exit_code = EXIT_SUCCESS,
                "completed"
            );
            EXIT_SUCCESS
        }
        Err(failure) => {
            let exit_code = report_failure(command_name, &failure);
            error!(command = command_name, exit_code, "failed: {failure:#}");
            exit_code
        }
    }
}

/// Logs go to stderr so stdout carries only the report envelope.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "querylens=debug"
    } else {
        "querylens=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    // Resolved per arm so `config-schema` works without a usable home directory.
    let paths = || resolve_runtime_paths(&cli.runtime);
    match &cli.command {
        Command::Classify(args) => commands::classify::run(args, &paths()?),
        Command::Stats(args) => commands::stats::run_stats(args, &paths()?),
        Command::Errors(args) => commands::stats::run_errors(args, &paths()?),
        Command::Performance(args) => commands::performance::run_categories(args, &paths()?),
        Command::Steps(args) => commands::performance::run_steps(args, &paths()?),
        Command::Channels(args) => commands::distribution::run_channels(args, &paths()?),
        Command::Scenarios(args) => commands::distribution::run_scenarios(args, &paths()?),
        Command::Users(args) => commands::distribution::run_users(args, &paths()?),
        Command::NoTicket(args) => commands::distribution::run_no_ticket(args, &paths()?),
        Command::Detail(args) => commands::detail::run(args, &paths()?),
        Command::Trend(args) => commands::trend::run(args, &paths()?),
        Command::ConfigSchema => commands::config_schema::run(),
    }
}

/// Prints the failure envelope where one applies and picks the exit code.
fn report_failure(command_name: &str, failure: &anyhow::Error) -> i32 {
    if let Some(command_failure) = failure.downcast_ref::<ReportCommandFailure>() {
        print_envelope(command_failure.envelope());
        return EXIT_RUNTIME_FAILURE;
    }
    if let Some(invalid) = failure.downcast_ref::<InputValidationFailure>() {
        print_envelope(&ReportEnvelope::invalid_input(command_name, invalid));
        return EXIT_VALIDATION_FAILURE;
    }
    EXIT_RUNTIME_FAILURE
}

fn print_envelope(envelope: &ReportEnvelope) {
    match serde_json::to_string(envelope) {
        Ok(encoded) => println!("{encoded}"),
        Err(encode_error) => {
            eprintln!("querylens: failed to encode error envelope: {encode_error}")
        }
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    querylens::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        args.db.as_deref(),
        args.config.as_deref(),
    )
}
