//! Single-day usage breakdowns: channels, scenarios, users and no-ticket
//! answers.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::{DateArg, emit, load_rules, open_store, store_query_failed, to_data};
use crate::aggregate::DateWindow;
use crate::config::{AnalyticsRules, RuntimePaths};
use crate::models::{ExecutionRecord, ReportEnvelope};
use crate::stats::{channel_stats, no_ticket_stats, rank_users, scenario_stats};
use crate::store::load_executions;
use crate::utils::time::format_date;

pub type DayArgs = DateArg;

struct DayInputs {
    window: DateWindow,
    rules: AnalyticsRules,
    executions: Vec<ExecutionRecord>,
}

fn load_day(command: &str, args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<DayInputs> {
    let window = DateWindow::single(args.resolve()?);
    let rules = load_rules(command, runtime_paths)?;
    let connection = open_store(command, runtime_paths)?;
    let executions = load_executions(&connection, &window)
        .map_err(store_query_failed(command, "failed to load executions"))?;
    Ok(DayInputs {
        window,
        rules,
        executions,
    })
}

pub fn run_channels(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "channels";
    let inputs = load_day(COMMAND, args, runtime_paths)?;
    let stats = channel_stats(
        &format_date(inputs.window.start),
        &inputs.executions,
        &inputs.rules.channels,
        &inputs.rules.roster,
    );
    info!(
        member_channels = stats.member_stats.len(),
        non_member_channels = stats.non_member_stats.len(),
        "computed channel distribution"
    );

    let envelope =
        ReportEnvelope::ok(COMMAND, to_data(COMMAND, &stats)?).with_window(&inputs.window);
    emit(&with_roster_warning(envelope, &inputs.rules))
}

pub fn run_scenarios(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "scenarios";
    let inputs = load_day(COMMAND, args, runtime_paths)?;
    let rows = scenario_stats(
        &inputs.executions,
        &inputs.rules.scenarios,
        &inputs.rules.roster,
    );
    info!(
        scenarios = rows.len(),
        executions = inputs.executions.len(),
        "computed scenario distribution"
    );

    let envelope =
        ReportEnvelope::ok(COMMAND, to_data(COMMAND, &rows)?).with_window(&inputs.window);
    emit(&with_roster_warning(envelope, &inputs.rules))
}

pub fn run_users(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "users";
    let inputs = load_day(COMMAND, args, runtime_paths)?;
    let rows = rank_users(&inputs.executions, &inputs.rules.unknown_user_label);
    info!(users = rows.len(), "ranked users");

    let envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &rows)?)
        .with_window(&inputs.window)
        .with_meta("user_count", json!(rows.len()));
    emit(&envelope)
}

pub fn run_no_ticket(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "no-ticket";
    let inputs = load_day(COMMAND, args, runtime_paths)?;
    let stats = no_ticket_stats(
        &format_date(inputs.window.start),
        &inputs.executions,
        &inputs.rules.no_ticket,
    );
    info!(count = stats.count, "counted no-ticket answers");

    let envelope =
        ReportEnvelope::ok(COMMAND, to_data(COMMAND, &stats)?).with_window(&inputs.window);
    emit(&envelope)
}

pub(super) fn with_roster_warning(
    envelope: ReportEnvelope,
    rules: &AnalyticsRules,
) -> ReportEnvelope {
    if rules.roster.is_empty() {
        envelope.with_warning(
            "roster_empty",
            "no project members configured; every execution counts as non-member",
        )
    } else {
        envelope
    }
}
