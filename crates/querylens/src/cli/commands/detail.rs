use anyhow::Result;
use clap::Args;
use serde_json::json;
use tracing::{info, warn};

use super::{command_failure, emit, load_rules, open_store, to_data};
use crate::config::RuntimePaths;
use crate::models::{InputValidationFailure, ReportEnvelope};
use crate::stats::performance_detail;
use crate::store::{load_execution, load_sql_executions, load_step_timings_for};

const COMMAND: &str = "detail";

#[derive(Debug, Clone, Args)]
pub struct DetailArgs {
    /// Business sequence number of the execution.
    #[arg(value_name = "BIZ_SEQ")]
    pub biz_seq: String,
}

pub fn run(args: &DetailArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let biz_seq = args.biz_seq.trim();
    if biz_seq.is_empty() {
        return Err(anyhow::Error::new(InputValidationFailure::new(
            "biz_seq",
            "biz_seq must not be empty",
        )));
    }

    let rules = load_rules(COMMAND, runtime_paths)?;
    let connection = open_store(COMMAND, runtime_paths)?;
    let store_failure = |error: anyhow::Error| {
        command_failure(
            COMMAND,
            "store_query_failed",
            "failed to load execution detail",
            &error,
        )
        .with_details(json!({ "biz_seq": biz_seq, "cause": format!("{error:#}") }))
        .into_error()
    };
    let execution = load_execution(&connection, biz_seq).map_err(store_failure)?;
    let timings = load_step_timings_for(&connection, biz_seq).map_err(store_failure)?;
    let sql_executions = load_sql_executions(&connection, biz_seq).map_err(store_failure)?;

    let detail = performance_detail(
        biz_seq,
        execution.as_ref(),
        &timings,
        sql_executions,
        &rules.steps,
        &rules.excluded_sub_step,
    );
    info!(
        biz_seq,
        steps = detail.steps.len(),
        sql = detail.sql_executions.len(),
        total_cost = detail.total_cost,
        "assembled execution detail"
    );

    let mut envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &detail)?)
        .with_meta("biz_seq", json!(biz_seq));
    if execution.is_none() && detail.steps.is_empty() && detail.sql_executions.is_empty() {
        warn!(biz_seq, "no records found for execution");
        envelope = envelope.with_warning("not_found", format!("no records logged for {biz_seq}"));
    }
    emit(&envelope)
}
