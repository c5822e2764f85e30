use serde::{Deserialize, Serialize};
use time::Date;

use crate::utils::time::day_of_timestamp;

/// One row of the execution log (`t_handler_logs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub biz_seq: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_payload: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<String>,

    pub create_time: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ExecutionRecord {
    #[must_use]
    pub fn result_code(&self) -> &str {
        self.result_code.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn day(&self) -> Option<Date> {
        day_of_timestamp(&self.create_time)
    }
}

/// One step timing sample (`t_step_time_record`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTiming {
    pub biz_seq: String,
    pub step_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_step_name: Option<String>,

    pub cost: f64,
    pub create_time: String,
}

impl StepTiming {
    #[must_use]
    pub fn day(&self) -> Option<Date> {
        day_of_timestamp(&self.create_time)
    }

    /// Whether the sample counts toward an execution's total. Like SQL
    /// `sub_step_name != excluded`, a missing sub-step never passes.
    #[must_use]
    pub fn counts_toward_total(&self, excluded_sub_step: &str) -> bool {
        self.sub_step_name
            .as_deref()
            .is_some_and(|sub_step| sub_step != excluded_sub_step)
    }
}

/// One SQL statement issued on behalf of an execution (`query_sql_log`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlExecution {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}
