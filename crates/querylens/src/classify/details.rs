use std::collections::BTreeMap;

use serde::Serialize;

use super::{ErrorCategory, ErrorLabels, Subsystem, classify, trailing_code};
use crate::models::ExecutionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecordDetail {
    pub biz_seq: String,
    pub result_code: String,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    pub create_time: String,
}

impl From<&ExecutionRecord> for ErrorRecordDetail {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            biz_seq: record.biz_seq.clone(),
            result_code: record.result_code().to_string(),
            request_payload: record.request_payload.clone(),
            response_payload: record.response_payload.clone(),
            create_time: record.create_time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeGroup {
    pub code: String,
    pub count: usize,
    pub details: Vec<ErrorRecordDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentErrorType {
    pub error_type: String,
    pub type_name: String,
    pub count: usize,
    pub code_groups: Vec<CodeGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentErrorDetails {
    pub query_date: String,
    pub business_errors: Vec<AgentErrorType>,
    pub system_errors: Vec<AgentErrorType>,
    pub total_business_count: usize,
    pub total_system_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DsCodeGroup {
    pub code: String,
    pub code_name: String,
    pub count: usize,
    pub details: Vec<ErrorRecordDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DsErrorDetails {
    pub query_date: String,
    pub business_errors: Vec<DsCodeGroup>,
    pub system_errors: Vec<DsCodeGroup>,
    pub total_business_count: usize,
    pub total_system_count: usize,
}

type AgentTypeTally<'a> = BTreeMap<String, BTreeMap<String, Vec<&'a ExecutionRecord>>>;

/// Agent failures grouped as category side -> category digit -> last four chars.
///
/// Records keep the order they were supplied in.
#[must_use]
pub fn group_agent_errors(
    query_date: &str,
    records: &[ExecutionRecord],
    labels: &ErrorLabels,
) -> AgentErrorDetails {
    let mut business = AgentTypeTally::new();
    let mut system = AgentTypeTally::new();

    for record in records {
        let code = record.result_code();
        let classification = classify(code);
        if classification.subsystem != Subsystem::Agent {
            continue;
        }
        let side = match classification.category {
            ErrorCategory::Business => &mut business,
            ErrorCategory::System => &mut system,
            ErrorCategory::Success => continue,
        };
        side.entry(classification.subcode)
            .or_default()
            .entry(trailing_code(code).to_string())
            .or_default()
            .push(record);
    }

    let business_errors = agent_types(business, labels);
    let system_errors = agent_types(system, labels);
    AgentErrorDetails {
        query_date: query_date.to_string(),
        total_business_count: business_errors.iter().map(|entry| entry.count).sum(),
        total_system_count: system_errors.iter().map(|entry| entry.count).sum(),
        business_errors,
        system_errors,
    }
}

/// Ds failures grouped by subcode, largest groups first.
#[must_use]
pub fn group_ds_errors(
    query_date: &str,
    records: &[ExecutionRecord],
    labels: &ErrorLabels,
) -> DsErrorDetails {
    let mut business: BTreeMap<String, Vec<&ExecutionRecord>> = BTreeMap::new();
    let mut system: BTreeMap<String, Vec<&ExecutionRecord>> = BTreeMap::new();

    for record in records {
        let classification = classify(record.result_code());
        if classification.subsystem != Subsystem::Ds {
            continue;
        }
        match classification.category {
            ErrorCategory::Business => business
                .entry(classification.subcode)
                .or_default()
                .push(record),
            ErrorCategory::System => system
                .entry(classification.subcode)
                .or_default()
                .push(record),
            ErrorCategory::Success => {}
        }
    }

    let business_errors = ds_groups(business, |code| labels.ds_business_code(code));
    let system_errors = ds_groups(system, |code| labels.ds_system_code(code));
    DsErrorDetails {
        query_date: query_date.to_string(),
        total_business_count: business_errors.iter().map(|group| group.count).sum(),
        total_system_count: system_errors.iter().map(|group| group.count).sum(),
        business_errors,
        system_errors,
    }
}

fn agent_types(tally: AgentTypeTally<'_>, labels: &ErrorLabels) -> Vec<AgentErrorType> {
    tally
        .into_iter()
        .map(|(error_type, groups)| {
            let code_groups = groups
                .into_iter()
                .map(|(code, records)| CodeGroup {
                    code,
                    count: records.len(),
                    details: records.into_iter().map(ErrorRecordDetail::from).collect(),
                })
                .collect::<Vec<_>>();
            AgentErrorType {
                type_name: labels.agent_type(&error_type),
                count: code_groups.iter().map(|group| group.count).sum(),
                error_type,
                code_groups,
            }
        })
        .collect()
}

fn ds_groups(
    tally: BTreeMap<String, Vec<&ExecutionRecord>>,
    label: impl Fn(&str) -> String,
) -> Vec<DsCodeGroup> {
    let mut groups = tally
        .into_iter()
        .map(|(code, records)| DsCodeGroup {
            code_name: label(&code),
            count: records.len(),
            details: records.into_iter().map(ErrorRecordDetail::from).collect(),
            code,
        })
        .collect::<Vec<_>>();
    groups.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.code.cmp(&right.code))
    });
    groups
}
