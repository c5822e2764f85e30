use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::ExecutionRecord;
use crate::utils::like::LikePattern;

/// Payload markers of a query answered without raising a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NoTicketDefinition {
    /// The request named no target systems.
    pub request_like: String,
    /// The response reported a successful execution.
    pub response_like: String,
}

impl Default for NoTicketDefinition {
    fn default() -> Self {
        Self {
            request_like: r#"%"sysNameList": []%"#.to_string(),
            response_like: "%查询执行成功%".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoTicketRule {
    request: LikePattern,
    response: LikePattern,
}

impl NoTicketRule {
    pub fn compile(definition: &NoTicketDefinition) -> Result<Self> {
        Ok(Self {
            request: LikePattern::new(&definition.request_like)
                .context("invalid no-ticket request pattern")?,
            response: LikePattern::new(&definition.response_like)
                .context("invalid no-ticket response pattern")?,
        })
    }

    #[must_use]
    pub fn matches(&self, execution: &ExecutionRecord) -> bool {
        self.request
            .matches_opt(execution.request_payload.as_deref())
            && self
                .response
                .matches_opt(execution.response_payload.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoTicketStats {
    pub query_date: String,
    pub count: usize,
}

#[must_use]
pub fn no_ticket_stats(
    query_date: &str,
    executions: &[ExecutionRecord],
    rule: &NoTicketRule,
) -> NoTicketStats {
    NoTicketStats {
        query_date: query_date.to_string(),
        count: executions
            .iter()
            .filter(|execution| rule.matches(execution))
            .count(),
    }
}
