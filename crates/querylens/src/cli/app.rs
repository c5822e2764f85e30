use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    classify::ClassifyArgs, detail::DetailArgs, distribution::DayArgs, performance::PerformanceArgs,
    stats::ErrorsArgs, trend::TrendArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "querylens",
    version,
    about = "Error and latency analytics over NL-to-SQL query logs"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// SQLite mirror of the log tables.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// JSON analytics config.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify raw result codes.
    Classify(ClassifyArgs),
    /// Success rates and subsystem error counts for one day.
    Stats(DayArgs),
    /// Failures of one subsystem grouped for drill-down.
    Errors(ErrorsArgs),
    /// End-to-end cost per backend category.
    Performance(PerformanceArgs),
    /// Cost per pipeline step.
    Steps(DayArgs),
    Channels(DayArgs),
    Scenarios(DayArgs),
    Users(DayArgs),
    NoTicket(DayArgs),
    /// Step costs and SQL statements of one execution.
    Detail(DetailArgs),
    /// Daily series over a date range.
    Trend(TrendArgs),
    /// Print the JSON schema of the config file.
    ConfigSchema,
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classify(_) => "classify",
            Self::Stats(_) => "stats",
            Self::Errors(_) => "errors",
            Self::Performance(_) => "performance",
            Self::Steps(_) => "steps",
            Self::Channels(_) => "channels",
            Self::Scenarios(_) => "scenarios",
            Self::Users(_) => "users",
            Self::NoTicket(_) => "no-ticket",
            Self::Detail(_) => "detail",
            Self::Trend(args) => args.command.name(),
            Self::ConfigSchema => "config-schema",
        }
    }
}
