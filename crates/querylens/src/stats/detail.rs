use serde::Serialize;

use crate::aggregate::{StepRule, round2};
use crate::models::{ExecutionRecord, SqlExecution, StepTiming};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailStep {
    pub step_name: String,
    pub step_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_step_name: Option<String>,
    pub cost: f64,
    pub create_time: String,
}

/// Everything recorded for one execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceDetail {
    pub biz_seq: String,
    pub request_payload: Option<String>,
    pub total_cost: f64,
    pub steps: Vec<DetailStep>,
    pub sql_executions: Vec<SqlExecution>,
}

/// Assembles the drill-down for `biz_seq`. Steps are ordered by creation
/// time. `excluded_sub_step` and samples without a sub-step are left out of
/// both the list and the total.
#[must_use]
pub fn performance_detail(
    biz_seq: &str,
    execution: Option<&ExecutionRecord>,
    timings: &[StepTiming],
    sql_executions: Vec<SqlExecution>,
    step_rules: &[StepRule],
    excluded_sub_step: &str,
) -> PerformanceDetail {
    let mut kept = timings
        .iter()
        .filter(|timing| {
            timing.biz_seq == biz_seq && timing.counts_toward_total(excluded_sub_step)
        })
        .collect::<Vec<_>>();
    kept.sort_by(|left, right| left.create_time.cmp(&right.create_time));

    let steps = kept
        .into_iter()
        .map(|timing| DetailStep {
            step_name: timing.step_name.clone(),
            step_label: step_rules
                .iter()
                .find(|step| step.name == timing.step_name)
                .map_or_else(|| timing.step_name.clone(), |step| step.label.clone()),
            sub_step_name: timing.sub_step_name.clone(),
            cost: timing.cost,
            create_time: timing.create_time.clone(),
        })
        .collect::<Vec<_>>();
    let total_cost = steps
        .iter()
        .map(|step| step.cost)
        .filter(|cost| cost.is_finite())
        .sum::<f64>();

    PerformanceDetail {
        biz_seq: biz_seq.to_string(),
        request_payload: execution.and_then(|execution| execution.request_payload.clone()),
        total_cost: round2(total_cost),
        steps,
        sql_executions,
    }
}
