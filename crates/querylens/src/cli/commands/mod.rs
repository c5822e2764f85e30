//! One module per subcommand plus the plumbing they share: config and store
//! loading, date argument parsing, and envelope output.

pub mod classify;
pub mod config_schema;
pub mod detail;
pub mod distribution;
pub mod performance;
pub mod stats;
pub mod trend;

use anyhow::{Context, Error, Result};
use clap::Args;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Value, json};
use time::Date;
use tracing::debug;

use crate::config::{AnalyticsRules, RuntimePaths, load_analytics_config};
use crate::models::{InputValidationFailure, ReportCommandFailure, ReportEnvelope};
use crate::store::open_log_store;
use crate::utils::time::{parse_date, today_utc};

/// `--date`, defaulting to today (UTC).
#[derive(Debug, Clone, Args)]
pub struct DateArg {
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<String>,
}

impl DateArg {
    pub fn resolve(&self) -> Result<Date> {
        match self.date.as_deref() {
            Some(raw) => parse_date_arg("date", raw),
            None => Ok(today_utc()),
        }
    }
}

pub fn parse_date_arg(field: &str, raw: &str) -> Result<Date> {
    parse_date(raw)
        .map_err(|error| Error::new(InputValidationFailure::new(field, format!("{error:#}"))))
}

pub fn load_rules(command: &str, paths: &RuntimePaths) -> Result<AnalyticsRules> {
    load_analytics_config(&paths.config_path, paths.config_required)
        .and_then(|config| AnalyticsRules::compile(&config))
        .map_err(|error| {
            command_failure(
                command,
                "config_invalid",
                "unable to load analytics config",
                &error,
            )
            .with_details(json!({
                "config_path": paths.config_path.display().to_string(),
                "cause": format!("{error:#}"),
            }))
            .into_error()
        })
}

pub fn open_store(command: &str, paths: &RuntimePaths) -> Result<Connection> {
    debug!(path = %paths.db_path.display(), "opening log store");
    open_log_store(&paths.db_path).map_err(|error| {
        command_failure(
            command,
            "store_unavailable",
            "unable to open log database",
            &error,
        )
        .with_details(json!({
            "db_path": paths.db_path.display().to_string(),
            "cause": format!("{error:#}"),
        }))
        .into_error()
    })
}

/// Wraps a failed step of `command` so `main` can print its envelope.
pub fn command_failure(command: &str, code: &str, message: &str, error: &Error) -> PendingFailure {
    PendingFailure {
        envelope: ReportEnvelope::error(command, code, message)
            .with_error_details(json!({ "cause": format!("{error:#}") })),
    }
}

/// Maps a failed store read of `command` to a `store_query_failed` envelope.
pub fn store_query_failed<'a>(
    command: &'a str,
    message: &'a str,
) -> impl Fn(Error) -> Error + Copy + 'a {
    move |error| command_failure(command, "store_query_failed", message, &error).into_error()
}

pub struct PendingFailure {
    envelope: ReportEnvelope,
}

impl PendingFailure {
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.envelope = self.envelope.with_error_details(details);
        self
    }

    #[must_use]
    pub fn into_error(self) -> Error {
        Error::new(ReportCommandFailure::new(self.envelope))
    }
}

pub fn to_data<T: Serialize>(command: &str, report: &T) -> Result<Value> {
    serde_json::to_value(report).map_err(|error| {
        command_failure(
            command,
            "report_encode_failed",
            "failed to encode report",
            &Error::new(error),
        )
        .into_error()
    })
}

pub fn emit(envelope: &ReportEnvelope) -> Result<()> {
    let encoded = serde_json::to_string(envelope).context("failed to encode report envelope")?;
    println!("{encoded}");
    Ok(())
}
