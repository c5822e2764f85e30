use anyhow::{Error, Result};
use clap::{Args, Subcommand};
use serde_json::json;
use tracing::{debug, info};

use super::distribution::with_roster_warning;
use super::{emit, load_rules, open_store, parse_date_arg, store_query_failed, to_data};
use crate::aggregate::DateWindow;
use crate::config::RuntimePaths;
use crate::models::{InputValidationFailure, ReportEnvelope};
use crate::stats::{channel_trend, query_trend, step_trend};
use crate::store::{load_executions, load_step_timings};
use crate::utils::time::{format_date, today_utc};

#[derive(Debug, Clone, Args)]
pub struct TrendArgs {
    #[command(subcommand)]
    pub command: TrendCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TrendCommand {
    /// Executions per day split by project membership.
    Queries(RangeArgs),
    /// Per-step cost per day.
    Steps(RangeArgs),
    /// Per-channel executions per day.
    Channels(RangeArgs),
}

impl TrendCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queries(_) => "trend.queries",
            Self::Steps(_) => "trend.steps",
            Self::Channels(_) => "trend.channels",
        }
    }

    fn range(&self) -> &RangeArgs {
        match self {
            Self::Queries(range) | Self::Steps(range) | Self::Channels(range) => range,
        }
    }
}

/// Inclusive date range. `--end` defaults to today (UTC) and `--start` to six
/// days before the end.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<String>,
}

impl RangeArgs {
    pub fn resolve(&self) -> Result<DateWindow> {
        let start = self
            .start
            .as_deref()
            .map(|raw| parse_date_arg("start", raw))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|raw| parse_date_arg("end", raw))
            .transpose()?;
        let window = DateWindow::resolve(start, end, today_utc());
        if window.is_inverted() {
            return Err(Error::new(InputValidationFailure::new(
                "start",
                format!(
                    "start {} is after end {}",
                    format_date(window.start),
                    format_date(window.end)
                ),
            )));
        }
        Ok(window)
    }
}

pub fn run(args: &TrendArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let command = args.command.name();
    let window = args.command.range().resolve()?;
    let rules = load_rules(command, runtime_paths)?;
    let connection = open_store(command, runtime_paths)?;
    let store_failure = store_query_failed(command, "failed to load trend inputs");
    let executions = load_executions(&connection, &window).map_err(store_failure)?;
    debug!(
        window = %window.label(),
        executions = executions.len(),
        "loaded trend window"
    );

    let envelope = match &args.command {
        TrendCommand::Queries(_) => {
            let rows = query_trend(&window, &executions, &rules.roster);
            info!(days = rows.len(), "computed query trend");
            let envelope = ReportEnvelope::ok(command, to_data(command, &rows)?);
            with_roster_warning(envelope, &rules)
        }
        TrendCommand::Steps(_) => {
            let timings = load_step_timings(&connection, &window).map_err(store_failure)?;
            let rows = step_trend(&window, timings, executions, &rules.steps);
            info!(rows = rows.len(), "computed step trend");
            ReportEnvelope::ok(command, to_data(command, &rows)?)
        }
        TrendCommand::Channels(_) => {
            let rows = channel_trend(&window, &executions, &rules.channels, &rules.roster);
            info!(rows = rows.len(), "computed channel trend");
            let envelope = ReportEnvelope::ok(command, to_data(command, &rows)?);
            with_roster_warning(envelope, &rules)
        }
    };

    let envelope = envelope
        .with_window(&window)
        .with_meta("day_count", json!(window.days().len()));
    emit(&envelope)
}
