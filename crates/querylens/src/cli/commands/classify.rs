use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::{emit, load_rules, to_data};
use crate::classify::{Classification, ErrorLabels, classify, classify_strict};
use crate::config::RuntimePaths;
use crate::models::ReportEnvelope;

const COMMAND: &str = "classify";

#[derive(Debug, Clone, Args)]
pub struct ClassifyArgs {
    #[arg(value_name = "CODE", required = true)]
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CodeReport {
    code: String,
    classification: Classification,
    label: String,
    strict: Classification,
    strict_label: String,
}

fn report(code: &str, labels: &ErrorLabels) -> CodeReport {
    let classification = classify(code);
    let strict = classify_strict(code);
    debug!(
        code,
        category = classification.category.as_str(),
        subsystem = classification.subsystem.as_str(),
        strict_category = strict.category.as_str(),
        "classified result code"
    );
    CodeReport {
        code: code.to_string(),
        label: labels.describe(&classification),
        strict_label: labels.describe(&strict),
        classification,
        strict,
    }
}

pub fn run(args: &ClassifyArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let rules = load_rules(COMMAND, runtime_paths)?;
    let reports = args
        .codes
        .iter()
        .map(|code| report(code, &rules.error_labels))
        .collect::<Vec<_>>();
    let failures = reports
        .iter()
        .filter(|report| report.classification.is_failure())
        .count();
    info!(codes = reports.len(), failures, "classified result codes");

    let envelope = ReportEnvelope::ok(COMMAND, to_data(COMMAND, &reports)?)
        .with_meta("code_count", json!(reports.len()))
        .with_meta("failure_count", json!(failures));
    emit(&envelope)
}
