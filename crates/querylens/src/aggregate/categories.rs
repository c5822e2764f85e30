use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{CostSummary, aggregate, round2};
use crate::models::{ExecutionRecord, StepTiming};
use crate::utils::like::LikePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentFilter {
    /// Executions absent from the production routing set.
    PreProduction,
    /// Executions present in the production routing set.
    Production,
    /// No environment restriction.
    Any,
}

impl EnvironmentFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreProduction => "pre_production",
            Self::Production => "production",
            Self::Any => "any",
        }
    }

    fn admits(self, in_production: bool) -> bool {
        match self {
            Self::PreProduction => !in_production,
            Self::Production => in_production,
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    Template,
    NonTemplate,
}

impl QueryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::NonTemplate => "non-template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CategoryDefinition {
    pub key: String,
    pub label: String,
    pub db_type: String,
    pub environment: EnvironmentFilter,
    /// LIKE pattern the request payload must match.
    pub request_like: String,
}

impl CategoryDefinition {
    pub fn new(db_type: &str, environment: EnvironmentFilter, label: &str) -> Self {
        Self {
            key: format!("{}_{}", db_type.to_ascii_lowercase(), environment.as_str()),
            label: label.to_string(),
            db_type: db_type.to_string(),
            environment,
            request_like: format!("%{db_type}%"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub definition: CategoryDefinition,
    request: LikePattern,
}

impl CategoryRule {
    pub fn compile(definition: &CategoryDefinition) -> Result<Self> {
        let request = LikePattern::new(&definition.request_like).with_context(|| {
            format!("invalid request pattern for category `{}`", definition.key)
        })?;
        Ok(Self {
            definition: definition.clone(),
            request,
        })
    }

    fn admits(&self, execution: &ExecutionRecord, production: &HashSet<String>) -> bool {
        self.request
            .matches_opt(execution.request_payload.as_deref())
            && self
                .definition
                .environment
                .admits(production.contains(&execution.biz_seq))
    }
}

/// Window-scoped rows consulted by [`group_by_category`].
#[derive(Debug, Clone, Copy)]
pub struct CategoryInputs<'a> {
    pub timings: &'a [StepTiming],
    pub executions: &'a [ExecutionRecord],
    /// `biz_seq`s routed to production within the window.
    pub production: &'a HashSet<String>,
    /// Marks template queries in the request payload.
    pub template_marker: &'a LikePattern,
    /// Sub-step excluded from per-execution sums.
    pub excluded_sub_step: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPerformance {
    pub category: String,
    pub label: String,
    pub db_type: String,
    pub environment: EnvironmentFilter,
    pub execution_count: usize,
    #[serde(flatten)]
    pub cost: CostSummary,
    pub max_cost_biz_seq: Option<String>,
}

/// End-to-end cost per backend category for one query kind.
///
/// Costs are summed per execution across sub-steps first; the summary and the
/// max owner are taken over those sums. Categories with no executions are
/// omitted.
#[must_use]
pub fn group_by_category(
    inputs: &CategoryInputs<'_>,
    categories: &[CategoryRule],
    kind: QueryKind,
) -> Vec<CategoryPerformance> {
    let of_kind = inputs
        .executions
        .iter()
        .filter(|execution| {
            let templated = inputs
                .template_marker
                .matches_opt(execution.request_payload.as_deref());
            match kind {
                QueryKind::Template => templated,
                // NULL NOT LIKE x is not true either.
                QueryKind::NonTemplate => execution.request_payload.is_some() && !templated,
            }
        })
        .collect::<Vec<_>>();

    let totals = execution_totals(inputs.timings, inputs.excluded_sub_step);

    categories
        .iter()
        .filter_map(|category| {
            let members = of_kind
                .iter()
                .filter(|execution| category.admits(execution, inputs.production))
                .map(|execution| execution.biz_seq.as_str())
                .collect::<HashSet<_>>();
            let sums = totals
                .iter()
                .filter(|(biz_seq, _)| members.contains(*biz_seq))
                .map(|(biz_seq, cost)| (*biz_seq, *cost))
                .collect::<Vec<_>>();
            if sums.is_empty() {
                return None;
            }

            let costs = sums.iter().map(|(_, cost)| *cost).collect::<Vec<_>>();
            Some(CategoryPerformance {
                category: category.definition.key.clone(),
                label: category.definition.label.clone(),
                db_type: category.definition.db_type.clone(),
                environment: category.definition.environment,
                execution_count: sums.len(),
                cost: aggregate(&costs),
                max_cost_biz_seq: max_owner(&sums),
            })
        })
        .collect()
}

/// Sums finite costs per execution, skipping `excluded_sub_step` and samples
/// without a sub-step. Ordered by `biz_seq`.
fn execution_totals<'a>(
    timings: &'a [StepTiming],
    excluded_sub_step: &str,
) -> BTreeMap<&'a str, f64> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for timing in timings {
        if !timing.counts_toward_total(excluded_sub_step) || !timing.cost.is_finite() {
            continue;
        }
        *totals.entry(timing.biz_seq.as_str()).or_default() += timing.cost;
    }
    totals
}

/// Smallest `biz_seq` among those whose rounded sum equals the rounded max.
fn max_owner(sums: &[(&str, f64)]) -> Option<String> {
    let max = sums
        .iter()
        .map(|(_, cost)| *cost)
        .fold(f64::NEG_INFINITY, f64::max);
    sums.iter()
        .filter(|(_, cost)| round2(*cost) == round2(max))
        .map(|(biz_seq, _)| *biz_seq)
        .min()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        CategoryDefinition, CategoryInputs, CategoryRule, EnvironmentFilter, QueryKind,
        group_by_category,
    };
    use crate::models::{ExecutionRecord, StepTiming};
    use crate::utils::like::LikePattern;

    fn timing(biz_seq: &str, sub_step: Option<&str>, cost: f64) -> StepTiming {
        StepTiming {
            biz_seq: biz_seq.to_string(),
            step_name: "SUB_QUERY".to_string(),
            sub_step_name: sub_step.map(str::to_string),
            cost,
            create_time: "2024-01-05 10:00:00".to_string(),
        }
    }

    fn execution(biz_seq: &str, request: &str) -> ExecutionRecord {
        ExecutionRecord {
            biz_seq: biz_seq.to_string(),
            result_code: Some("0000".to_string()),
            request_payload: Some(request.to_string()),
            response_payload: None,
            create_time: "2024-01-05 10:00:00".to_string(),
            channel: None,
            user_id: None,
        }
    }

    fn categories() -> Vec<CategoryRule> {
        [
            CategoryDefinition::new("TDSQL", EnvironmentFilter::PreProduction, "TDSQL pre-prod"),
            CategoryDefinition::new("TDSQL", EnvironmentFilter::Production, "TDSQL prod"),
            CategoryDefinition::new("HIVE", EnvironmentFilter::Any, "HIVE prod"),
        ]
        .iter()
        .map(|definition| CategoryRule::compile(definition).expect("category should compile"))
        .collect()
    }

    #[test]
    fn splits_by_environment_and_excludes_sub_step() {
        let timings = vec![
            timing("t1", Some("LLM"), 100.0),
            timing("t1", Some("REQ_DS"), 5000.0),
            timing("t1", None, 50.0),
            timing("t2", Some("LLM"), 300.0),
            timing("p1", Some("LLM"), 700.0),
            timing("h1", Some("LLM"), 20.0),
        ];
        let executions = vec![
            execution("t1", "TDSQL ### a"),
            execution("t2", "TDSQL ### b"),
            execution("p1", "TDSQL ### c"),
            execution("h1", "HIVE ### d"),
            execution("plain", "TDSQL no marker"),
        ];
        let production = HashSet::from(["p1".to_string(), "h1".to_string()]);
        let marker = LikePattern::new("%###%").expect("marker should compile");
        let inputs = CategoryInputs {
            timings: &timings,
            executions: &executions,
            production: &production,
            template_marker: &marker,
            excluded_sub_step: "REQ_DS",
        };

        let rows = group_by_category(&inputs, &categories(), QueryKind::Template);
        let keys = rows
            .iter()
            .map(|row| row.category.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["tdsql_pre_production", "tdsql_production", "hive_any"]
        );

        assert_eq!(rows[0].execution_count, 2);
        assert_eq!(rows[0].cost.avg_cost, 200.0);
        assert_eq!(rows[0].cost.max_cost, 300.0);
        assert_eq!(rows[0].max_cost_biz_seq.as_deref(), Some("t2"));

        assert_eq!(rows[1].max_cost_biz_seq.as_deref(), Some("p1"));
        assert_eq!(rows[2].cost.max_cost, 20.0);

        let non_template = group_by_category(&inputs, &categories(), QueryKind::NonTemplate);
        assert!(non_template.is_empty(), "{non_template:?}");
    }

    #[test]
    fn max_owner_ties_resolve_to_smallest_biz_seq() {
        let timings = vec![
            timing("zeta", Some("LLM"), 400.0),
            timing("alpha", Some("LLM"), 400.0),
            timing("mid", Some("LLM"), 100.0),
        ];
        let executions = vec![
            execution("zeta", "HIVE"),
            execution("alpha", "HIVE"),
            execution("mid", "HIVE"),
        ];
        let production = HashSet::new();
        let marker = LikePattern::new("%###%").expect("marker should compile");
        let inputs = CategoryInputs {
            timings: &timings,
            executions: &executions,
            production: &production,
            template_marker: &marker,
            excluded_sub_step: "REQ_DS",
        };

        let rows = group_by_category(&inputs, &categories(), QueryKind::NonTemplate);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].max_cost_biz_seq.as_deref(), Some("alpha"));
        assert_eq!(rows[0].cost.avg_cost, 300.0);
    }

    #[test]
    fn samples_without_sub_step_are_left_out_of_sums() {
        let timings = vec![
            timing("h1", Some("LLM"), 100.0),
            timing("h1", None, 900.0),
            timing("h1", Some("REQ_DS"), 5000.0),
        ];
        let executions = vec![execution("h1", "HIVE ### q")];
        let production = HashSet::new();
        let marker = LikePattern::new("%###%").expect("marker should compile");
        let inputs = CategoryInputs {
            timings: &timings,
            executions: &executions,
            production: &production,
            template_marker: &marker,
            excluded_sub_step: "REQ_DS",
        };

        let rows = group_by_category(&inputs, &categories(), QueryKind::Template);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost.max_cost, 100.0);
        assert_eq!(rows[0].max_cost_biz_seq.as_deref(), Some("h1"));
    }
}
