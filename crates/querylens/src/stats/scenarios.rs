//! Query scenarios as ordered predicates over request/response payloads.
//!
//! Predicates follow SQL three-valued logic: a `LIKE` against a missing
//! payload is unknown, and only rows whose predicate is definitely true are
//! counted.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::membership::{MemberSplit, MembershipPolicy};
use crate::models::ExecutionRecord;
use crate::utils::like::LikePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Condition {
    Like {
        field: PayloadField,
        pattern: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    fn like(field: PayloadField, pattern: &str, ignore_case: bool) -> Self {
        Self::Like {
            field,
            pattern: pattern.to_string(),
            ignore_case,
        }
    }

    /// `UPPER(request) LIKE pattern`.
    #[must_use]
    pub fn request_upper(pattern: &str) -> Self {
        Self::like(PayloadField::Request, pattern, true)
    }

    #[must_use]
    pub fn request(pattern: &str) -> Self {
        Self::like(PayloadField::Request, pattern, false)
    }

    #[must_use]
    pub fn response(pattern: &str) -> Self {
        Self::like(PayloadField::Response, pattern, false)
    }

    #[must_use]
    pub fn response_upper(pattern: &str) -> Self {
        Self::like(PayloadField::Response, pattern, true)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDefinition {
    pub key: String,
    pub label: String,
    pub condition: Condition,
}

/// Request keywords that mark a query as part of the ticket workflow.
pub const TICKET_REQUEST_KEYWORDS: &[&str] = &["%提单%", "%确认%", "%同意%"];
/// Response phrases that mark a query as part of the ticket workflow.
pub const TICKET_RESPONSE_KEYWORDS: &[&str] = &["%很荣幸能够%", "%用户协议%"];

/// `condition` ANDed after every exclusion gathered so far.
fn guarded(exclusions: &[Condition], condition: Condition) -> Condition {
    let mut all = exclusions.to_vec();
    all.push(condition);
    Condition::All(all)
}

/// The built-in scenario list. Each scenario excludes the keyword scenarios
/// listed before it, so the ordering is significant.
#[must_use]
pub fn default_scenarios() -> Vec<ScenarioDefinition> {
    let not_upper = |pattern: &str| Condition::request_upper(pattern).negate();
    let mut exclusions = vec![not_upper("%EXPLAIN%")];
    let mut scenarios = Vec::new();
    let mut push = |key: &str, label: &str, condition: Condition| {
        scenarios.push(ScenarioDefinition {
            key: key.to_string(),
            label: label.to_string(),
            condition,
        });
    };

    push(
        "execution_plan",
        "execution plan",
        Condition::request_upper("%EXPLAIN%"),
    );

    push(
        "yn_query",
        "Y/N query",
        guarded(&exclusions, Condition::request_upper("%IF(%")),
    );
    exclusions.push(not_upper("%IF(%"));

    push(
        "count_query",
        "count query",
        guarded(&exclusions, Condition::request_upper("%COUNT%")),
    );
    exclusions.push(not_upper("%COUNT%"));

    push(
        "table_structure",
        "table structure",
        Condition::All(
            [
                exclusions.clone(),
                vec![
                    Condition::Any(vec![
                        Condition::request_upper("%DESC%"),
                        Condition::request_upper("%SHOW%"),
                    ]),
                    not_upper("%SELECT%"),
                ],
            ]
            .concat(),
        ),
    );
    exclusions.push(not_upper("%SHOW%"));
    exclusions.push(Condition::Any(vec![
        not_upper("%DESC%"),
        Condition::request_upper("%SELECT%"),
    ]));

    push(
        "enum_query",
        "enum query",
        guarded(&exclusions, Condition::request_upper("%DISTINCT%")),
    );
    exclusions.push(not_upper("%DISTINCT%"));

    push(
        "time_query",
        "time query",
        guarded(&exclusions, Condition::request_upper("%TIME%FROM%")),
    );
    exclusions.push(not_upper("%TIME%FROM%"));

    push(
        "config_query",
        "config query",
        Condition::response_upper("%SQL_TITLE%配置%"),
    );

    push(
        "field_length",
        "field length",
        guarded(&exclusions, Condition::request_upper("%LENGTH%")),
    );

    let ticket_keywords = TICKET_REQUEST_KEYWORDS
        .iter()
        .map(|pattern| Condition::request(pattern))
        .chain(
            TICKET_RESPONSE_KEYWORDS
                .iter()
                .map(|pattern| Condition::response(pattern)),
        )
        .collect::<Vec<_>>();
    push(
        "ticket_related",
        "ticket related",
        guarded(&exclusions, Condition::Any(ticket_keywords.clone())),
    );

    let mut other = exclusions;
    other.extend(ticket_keywords.into_iter().map(Condition::negate));
    push("other", "other", Condition::All(other));

    scenarios
}

#[derive(Debug, Clone)]
enum Matcher {
    Like {
        field: PayloadField,
        pattern: LikePattern,
    },
    Not(Box<Matcher>),
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

impl Matcher {
    fn compile(condition: &Condition) -> Result<Self> {
        Ok(match condition {
            Condition::Like {
                field,
                pattern,
                ignore_case,
            } => Self::Like {
                field: *field,
                pattern: if *ignore_case {
                    LikePattern::case_insensitive(pattern)?
                } else {
                    LikePattern::new(pattern)?
                },
            },
            Condition::Not(inner) => Self::Not(Box::new(Self::compile(inner)?)),
            Condition::All(parts) => Self::All(
                parts
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Condition::Any(parts) => Self::Any(
                parts
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// `None` is SQL's unknown.
    fn eval(&self, execution: &ExecutionRecord) -> Option<bool> {
        match self {
            Self::Like { field, pattern } => {
                let value = match field {
                    PayloadField::Request => execution.request_payload.as_deref(),
                    PayloadField::Response => execution.response_payload.as_deref(),
                };
                value.map(|value| pattern.is_match(value))
            }
            Self::Not(inner) => inner.eval(execution).map(|value| !value),
            Self::All(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.eval(execution) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Self::Any(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.eval(execution) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioRule {
    pub key: String,
    pub label: String,
    matcher: Matcher,
}

impl ScenarioRule {
    pub fn compile(definition: &ScenarioDefinition) -> Result<Self> {
        let matcher = Matcher::compile(&definition.condition)
            .with_context(|| format!("invalid condition for scenario `{}`", definition.key))?;
        Ok(Self {
            key: definition.key.clone(),
            label: definition.label.clone(),
            matcher,
        })
    }

    #[must_use]
    pub fn matches(&self, execution: &ExecutionRecord) -> bool {
        self.matcher.eval(execution) == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioCount {
    pub scenario: String,
    pub scenario_label: String,
    #[serde(flatten)]
    pub split: MemberSplit,
}

/// Counts executions per scenario, largest first. Scenarios are evaluated
/// independently, so one execution may count toward several.
#[must_use]
pub fn scenario_stats(
    executions: &[ExecutionRecord],
    scenarios: &[ScenarioRule],
    membership: &dyn MembershipPolicy,
) -> Vec<ScenarioCount> {
    let mut rows = scenarios
        .iter()
        .map(|scenario| {
            let mut split = MemberSplit::default();
            for execution in executions.iter().filter(|execution| scenario.matches(execution)) {
                split.record(membership.is_member(execution.user_id.as_deref()));
            }
            ScenarioCount {
                scenario: scenario.key.clone(),
                scenario_label: scenario.label.clone(),
                split,
            }
        })
        .collect::<Vec<_>>();
    rows.sort_by(|left, right| right.split.count.cmp(&left.split.count));
    rows
}

#[cfg(test)]
mod tests {
    use super::{Condition, ScenarioRule, default_scenarios, scenario_stats};
    use crate::models::ExecutionRecord;
    use crate::stats::ProjectRoster;

    fn execution(request: Option<&str>, response: Option<&str>, user: &str) -> ExecutionRecord {
        ExecutionRecord {
            biz_seq: "seq".to_string(),
            result_code: None,
            request_payload: request.map(str::to_string),
            response_payload: response.map(str::to_string),
            create_time: "2024-01-05 10:00:00".to_string(),
            channel: None,
            user_id: Some(user.to_string()),
        }
    }

    fn rules() -> Vec<ScenarioRule> {
        default_scenarios()
            .iter()
            .map(|definition| ScenarioRule::compile(definition).expect("scenario should compile"))
            .collect()
    }

    fn matching_keys(execution: &ExecutionRecord) -> Vec<String> {
        rules()
            .into_iter()
            .filter(|rule| rule.matches(execution))
            .map(|rule| rule.key)
            .collect()
    }

    #[test]
    fn keyword_scenarios_are_mutually_exclusive_in_order() {
        let explain = execution(Some("explain select count(*) from t"), Some("ok"), "u");
        assert_eq!(matching_keys(&explain), vec!["execution_plan"]);

        let count = execution(Some("select count(*) from t"), Some("ok"), "u");
        assert_eq!(matching_keys(&count), vec!["count_query"]);

        let show = execution(Some("show tables"), Some("ok"), "u");
        assert_eq!(matching_keys(&show), vec!["table_structure"]);

        let distinct = execution(Some("select distinct region from t"), Some("ok"), "u");
        assert_eq!(matching_keys(&distinct), vec!["enum_query"]);

        let time = execution(Some("select time from t"), Some("ok"), "u");
        assert_eq!(matching_keys(&time), vec!["time_query"]);

        let plain = execution(Some("list owners"), Some("ok"), "u");
        assert_eq!(matching_keys(&plain), vec!["other"]);
    }

    #[test]
    fn ticket_keywords_split_ticket_from_other() {
        let ticket = execution(Some("请帮我提单"), Some("ok"), "u");
        assert_eq!(matching_keys(&ticket), vec!["ticket_related"]);

        let agreement = execution(Some("lookup"), Some("请阅读用户协议"), "u");
        assert_eq!(matching_keys(&agreement), vec!["ticket_related"]);
    }

    #[test]
    fn missing_payloads_are_unknown_not_false() {
        let rule = ScenarioRule::compile(&super::ScenarioDefinition {
            key: "no_explain".to_string(),
            label: "no explain".to_string(),
            condition: Condition::request_upper("%EXPLAIN%").negate(),
        })
        .expect("scenario should compile");
        assert!(!rule.matches(&execution(None, None, "u")));
        assert!(rule.matches(&execution(Some("select 1"), None, "u")));

        // `other` needs a response to prove the ticket phrases are absent.
        let no_response = execution(Some("list owners"), None, "u");
        assert!(matching_keys(&no_response).is_empty());
    }

    #[test]
    fn stats_sort_by_count_with_member_split() {
        let roster = ["alice"].into_iter().collect::<ProjectRoster>();
        let executions = vec![
            execution(Some("explain x"), Some("ok"), "alice"),
            execution(Some("select count(1)"), Some("ok"), "bob"),
            execution(Some("select count(2)"), Some("ok"), "alice"),
        ];
        let rows = scenario_stats(&executions, &rules(), &roster);

        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].scenario, "count_query");
        assert_eq!(rows[0].split.count, 2);
        assert_eq!(rows[0].split.member_count, 1);
        assert_eq!(rows[0].split.non_member_count, 1);
        assert_eq!(rows[1].scenario, "execution_plan");
        assert_eq!(rows[2].split.count, 0);
    }

    #[test]
    fn conditions_round_trip_through_config_json() {
        let json = serde_json::to_string(&Condition::request_upper("%IF(%").negate())
            .expect("condition should serialize");
        assert_eq!(
            json,
            r#"{"not":{"like":{"field":"request","pattern":"%IF(%","ignore_case":true}}}"#
        );
    }
}
