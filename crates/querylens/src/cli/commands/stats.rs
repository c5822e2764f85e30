use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::json;
use tracing::info;

use super::distribution::DayArgs;
use super::{emit, load_rules, open_store, store_query_failed, to_data};
use crate::aggregate::DateWindow;
use crate::classify::{compute_query_stats, group_agent_errors, group_ds_errors};
use crate::config::RuntimePaths;
use crate::models::ReportEnvelope;
use crate::store::load_executions;
use crate::utils::time::format_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubsystemArg {
    Agent,
    Ds,
}

#[derive(Debug, Clone, Args)]
pub struct ErrorsArgs {
    #[command(flatten)]
    pub day: DayArgs,

    #[arg(long, value_enum)]
    pub subsystem: SubsystemArg,
}

pub fn run_stats(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "stats";
    let day = args.resolve()?;
    let window = DateWindow::single(day);
    let connection = open_store(COMMAND, runtime_paths)?;
    let executions = load_executions(&connection, &window)
        .map_err(store_query_failed(COMMAND, "failed to load executions"))?;

    let stats = compute_query_stats(
        &format_date(day),
        executions
            .iter()
            .map(|execution| execution.result_code.as_deref()),
    );
    info!(
        total = stats.overall.total_count,
        failures = stats.overall.failure_count,
        "computed query stats"
    );

    let envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &stats)?).with_window(&window);
    emit(&envelope)
}

pub fn run_errors(args: &ErrorsArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "errors";
    let day = args.day.resolve()?;
    let window = DateWindow::single(day);
    let rules = load_rules(COMMAND, runtime_paths)?;
    let connection = open_store(COMMAND, runtime_paths)?;
    let executions = load_executions(&connection, &window)
        .map_err(store_query_failed(COMMAND, "failed to load executions"))?;

    let query_date = format_date(day);
    let data = match args.subsystem {
        SubsystemArg::Agent => {
            let details = group_agent_errors(&query_date, &executions, &rules.error_labels);
            info!(
                business = details.total_business_count,
                system = details.total_system_count,
                "grouped agent errors"
            );
            to_data(COMMAND, &details)?
        }
        SubsystemArg::Ds => {
            let details = group_ds_errors(&query_date, &executions, &rules.error_labels);
            info!(
                business = details.total_business_count,
                system = details.total_system_count,
                "grouped ds errors"
            );
            to_data(COMMAND, &details)?
        }
    };

    let subsystem = match args.subsystem {
        SubsystemArg::Agent => "agent",
        SubsystemArg::Ds => "ds",
    };
    let envelope = ReportEnvelope::ok(COMMAND, data)
        .with_window(&window)
        .with_meta("subsystem", json!(subsystem));
    emit(&envelope)
}
