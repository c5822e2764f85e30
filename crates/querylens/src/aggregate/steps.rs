use std::collections::HashSet;

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{CostSummary, aggregate};
use crate::models::{ExecutionRecord, StepTiming};
use crate::utils::like::LikePattern;

/// A pipeline step as configured: name, display label and inclusion filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,
    pub label: String,

    /// Samples owned by executions whose request matches this LIKE pattern
    /// are left out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_request_like: Option<String>,

    /// Only samples strictly above this cost are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cost_exclusive: Option<f64>,
}

impl StepDefinition {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            exclude_request_like: None,
            min_cost_exclusive: None,
        }
    }

    #[must_use]
    pub fn excluding_requests(mut self, pattern: &str) -> Self {
        self.exclude_request_like = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn with_cost_floor(mut self, floor: f64) -> Self {
        self.min_cost_exclusive = Some(floor);
        self
    }
}

/// A [`StepDefinition`] with its request pattern compiled.
#[derive(Debug, Clone)]
pub struct StepRule {
    pub name: String,
    pub label: String,
    exclude_request: Option<LikePattern>,
    min_cost_exclusive: Option<f64>,
}

impl StepRule {
    pub fn compile(definition: &StepDefinition) -> Result<Self> {
        let exclude_request = definition
            .exclude_request_like
            .as_deref()
            .map(LikePattern::new)
            .transpose()
            .with_context(|| format!("invalid exclusion pattern for step `{}`", definition.name))?;
        Ok(Self {
            name: definition.name.clone(),
            label: definition.label.clone(),
            exclude_request,
            min_cost_exclusive: definition.min_cost_exclusive,
        })
    }

    fn excluded_executions<'a>(&self, executions: &'a [ExecutionRecord]) -> HashSet<&'a str> {
        let Some(pattern) = &self.exclude_request else {
            return HashSet::new();
        };
        executions
            .iter()
            .filter(|execution| pattern.matches_opt(execution.request_payload.as_deref()))
            .map(|execution| execution.biz_seq.as_str())
            .collect()
    }

    fn samples(&self, timings: &[StepTiming], executions: &[ExecutionRecord]) -> Vec<f64> {
        let excluded = self.excluded_executions(executions);
        timings
            .iter()
            .filter(|timing| timing.step_name == self.name)
            .filter(|timing| !excluded.contains(timing.biz_seq.as_str()))
            .filter(|timing| {
                self.min_cost_exclusive
                    .is_none_or(|floor| timing.cost > floor)
            })
            .map(|timing| timing.cost)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStepPolicy {
    /// Point-in-time views: steps without samples produce no row.
    Omit,
    /// Trend views: steps without samples produce an all-zero row.
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPerformance {
    pub step_name: String,
    pub step_label: String,
    pub sample_count: usize,
    #[serde(flatten)]
    pub cost: CostSummary,
}

/// Per-step cost summary in the configured step order.
///
/// `executions` supplies the request payloads consulted by each step's
/// exclusion pattern; it should cover the same window as `timings`.
#[must_use]
pub fn group_by_step(
    timings: &[StepTiming],
    steps: &[StepRule],
    executions: &[ExecutionRecord],
    policy: EmptyStepPolicy,
) -> Vec<StepPerformance> {
    steps
        .iter()
        .filter_map(|step| {
            let samples = step.samples(timings, executions);
            let sample_count = samples.iter().filter(|cost| cost.is_finite()).count();
            if sample_count == 0 && policy == EmptyStepPolicy::Omit {
                return None;
            }
            Some(StepPerformance {
                step_name: step.name.clone(),
                step_label: step.label.clone(),
                sample_count,
                cost: aggregate(&samples),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{EmptyStepPolicy, StepDefinition, StepRule, group_by_step};
    use crate::models::{ExecutionRecord, StepTiming};

    fn timing(biz_seq: &str, step: &str, cost: f64) -> StepTiming {
        StepTiming {
            biz_seq: biz_seq.to_string(),
            step_name: step.to_string(),
            sub_step_name: None,
            cost,
            create_time: "2024-01-05 10:00:00".to_string(),
        }
    }

    fn execution(biz_seq: &str, request: &str) -> ExecutionRecord {
        ExecutionRecord {
            biz_seq: biz_seq.to_string(),
            result_code: None,
            request_payload: Some(request.to_string()),
            response_payload: None,
            create_time: "2024-01-05 10:00:00".to_string(),
            channel: None,
            user_id: None,
        }
    }

    fn rules(definitions: &[StepDefinition]) -> Vec<StepRule> {
        definitions
            .iter()
            .map(|definition| StepRule::compile(definition).expect("step should compile"))
            .collect()
    }

    #[test]
    fn schema_step_applies_floor_and_backend_exclusion() {
        let steps = rules(&[StepDefinition::new("QUERY_SCHEMA", "schema lookup")
            .excluding_requests("%HIVE%")
            .with_cost_floor(1000.0)]);
        let timings = vec![
            timing("a", "QUERY_SCHEMA", 500.0),
            timing("b", "QUERY_SCHEMA", 1100.0),
            timing("c", "QUERY_SCHEMA", 1200.0),
            timing("d", "QUERY_SCHEMA", 1300.0),
            timing("e", "QUERY_SCHEMA", 1000.0),
            timing("hive", "QUERY_SCHEMA", 9000.0),
        ];
        let executions = vec![
            execution("hive", "{\"dbType\":\"HIVE\"}"),
            execution("b", "{}"),
        ];

        let rows = group_by_step(&timings, &steps, &executions, EmptyStepPolicy::Omit);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sample_count, 3);
        assert_eq!(rows[0].cost.avg_cost, 1200.0);
        assert_eq!(rows[0].cost.max_cost, 1300.0);
        assert_eq!(rows[0].cost.p90_cost, 1280.0);
    }

    #[test]
    fn empty_steps_follow_policy() {
        let steps = rules(&[
            StepDefinition::new("INFO_EXTRACTION_LLM", "info extraction"),
            StepDefinition::new("RESULT_DEAL", "result handling"),
        ]);
        let timings = vec![timing("a", "RESULT_DEAL", 10.0)];

        let omitted = group_by_step(&timings, &steps, &[], EmptyStepPolicy::Omit);
        assert_eq!(omitted.len(), 1);
        assert_eq!(omitted[0].step_name, "RESULT_DEAL");

        let filled = group_by_step(&timings, &steps, &[], EmptyStepPolicy::ZeroFill);
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].step_name, "INFO_EXTRACTION_LLM");
        assert!(filled[0].cost.is_empty());
        assert_eq!(filled[1].cost.avg_cost, 10.0);
    }

    #[test]
    fn like_metacharacters_stay_literal() {
        let step = StepDefinition::new("SUB_QUERY", "sub query").excluding_requests("%IF(%");
        let steps = rules(&[step]);
        let timings = vec![timing("a", "SUB_QUERY", 5.0), timing("b", "SUB_QUERY", 7.0)];
        let executions = vec![
            execution("a", "select if(x)"),
            execution("b", "SELECT IF(x)"),
        ];

        let rows = group_by_step(&timings, &steps, &executions, EmptyStepPolicy::Omit);
        assert_eq!(rows[0].sample_count, 1);
        assert_eq!(rows[0].cost.max_cost, 5.0);
    }
}
