use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::json;
use tracing::{debug, info};

use super::distribution::DayArgs;
use super::{emit, load_rules, open_store, store_query_failed, to_data};
use crate::aggregate::{
    CategoryInputs, DateWindow, EmptyStepPolicy, QueryKind, group_by_category, group_by_step,
};
use crate::config::RuntimePaths;
use crate::models::ReportEnvelope;
use crate::store::{load_executions, load_production_biz_seqs, load_step_timings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KindArg {
    #[default]
    Template,
    NonTemplate,
}

impl From<KindArg> for QueryKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Template => Self::Template,
            KindArg::NonTemplate => Self::NonTemplate,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PerformanceArgs {
    #[command(flatten)]
    pub day: DayArgs,

    /// Restrict to template queries or to everything else.
    #[arg(long, value_enum, default_value_t = KindArg::Template)]
    pub kind: KindArg,
}

pub fn run_categories(args: &PerformanceArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "performance";
    let window = DateWindow::single(args.day.resolve()?);
    let rules = load_rules(COMMAND, runtime_paths)?;
    let connection = open_store(COMMAND, runtime_paths)?;
    let store_failure = store_query_failed(COMMAND, "failed to load performance inputs");
    let executions = load_executions(&connection, &window).map_err(store_failure)?;
    let timings = load_step_timings(&connection, &window).map_err(store_failure)?;
    let production = load_production_biz_seqs(&connection, &window).map_err(store_failure)?;
    debug!(
        executions = executions.len(),
        timings = timings.len(),
        production = production.len(),
        "loaded performance inputs"
    );

    let kind = QueryKind::from(args.kind);
    let inputs = CategoryInputs {
        timings: &timings,
        executions: &executions,
        production: &production,
        template_marker: &rules.template_marker,
        excluded_sub_step: &rules.excluded_sub_step,
    };
    let rows = group_by_category(&inputs, &rules.categories, kind);
    info!(
        kind = kind.as_str(),
        categories = rows.len(),
        "computed category performance"
    );

    let envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &rows)?)
        .with_window(&window)
        .with_meta("kind", json!(kind.as_str()));
    emit(&envelope)
}

pub fn run_steps(args: &DayArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    const COMMAND: &str = "steps";
    let window = DateWindow::single(args.resolve()?);
    let rules = load_rules(COMMAND, runtime_paths)?;
    let connection = open_store(COMMAND, runtime_paths)?;
    let store_failure = store_query_failed(COMMAND, "failed to load step timings");
    let executions = load_executions(&connection, &window).map_err(store_failure)?;
    let timings = load_step_timings(&connection, &window).map_err(store_failure)?;

    let rows = group_by_step(&timings, &rules.steps, &executions, EmptyStepPolicy::Omit);
    info!(
        steps = rows.len(),
        timings = timings.len(),
        "computed step performance"
    );

    let envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &rows)?).with_window(&window);
    emit(&envelope)
}
