//! Lookup tables and predicates injected into the engine.
//!
//! [`AnalyticsConfig`] is the serializable form read from JSON; every field
//! has a built-in default. [`AnalyticsRules`] is the compiled form handed to
//! the commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{
    CategoryDefinition, CategoryRule, EnvironmentFilter, StepDefinition, StepRule,
};
use crate::classify::ErrorLabels;
use crate::stats::{
    ChannelCatalog, NoTicketDefinition, NoTicketRule, ProjectRoster, ScenarioDefinition,
    ScenarioRule, default_scenarios,
};
use crate::utils::like::LikePattern;

const HIVE_MARKER: &str = "%HIVE%";
const SCHEMA_COST_FLOOR_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    pub error_labels: ErrorLabels,
    /// Pipeline steps in display order.
    pub steps: Vec<StepDefinition>,
    pub backend_categories: Vec<CategoryDefinition>,
    /// LIKE pattern marking a template query.
    pub template_marker: String,
    /// Sub-step left out of per-execution totals.
    pub excluded_sub_step: String,
    pub channels: ChannelCatalog,
    pub scenarios: Vec<ScenarioDefinition>,
    pub no_ticket: NoTicketDefinition,
    /// User ids counted as project members.
    pub project_members: Vec<String>,
    pub unknown_user_label: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            error_labels: ErrorLabels::default(),
            steps: default_steps(),
            backend_categories: default_categories(),
            template_marker: "%###%".to_string(),
            excluded_sub_step: "REQ_DS".to_string(),
            channels: ChannelCatalog::default(),
            scenarios: default_scenarios(),
            no_ticket: NoTicketDefinition::default(),
            project_members: Vec::new(),
            unknown_user_label: "unknown user".to_string(),
        }
    }
}

fn default_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("INFO_EXTRACTION_LLM", "info extraction (LLM)"),
        StepDefinition::new("SQL_EXTRACTION_LLM", "SQL extraction (LLM)"),
        StepDefinition::new("QUERY_SCHEMA", "schema lookup")
            .excluding_requests(HIVE_MARKER)
            .with_cost_floor(SCHEMA_COST_FLOOR_MS),
        StepDefinition::new("QUERY_INTENT", "intent recognition"),
        StepDefinition::new("SUB_QUERY", "sub query").excluding_requests(HIVE_MARKER),
        StepDefinition::new("RESULT_DEAL", "result handling"),
    ]
}

fn default_categories() -> Vec<CategoryDefinition> {
    vec![
        CategoryDefinition::new(
            "TDSQL",
            EnvironmentFilter::PreProduction,
            "TDSQL pre-production",
        ),
        CategoryDefinition::new("TDSQL", EnvironmentFilter::Production, "TDSQL production"),
        CategoryDefinition::new(
            "TIDB",
            EnvironmentFilter::PreProduction,
            "TIDB pre-production",
        ),
        CategoryDefinition::new("TIDB", EnvironmentFilter::Production, "TIDB production"),
        CategoryDefinition::new("HIVE", EnvironmentFilter::Any, "HIVE production"),
    ]
}

/// Reads `path` when it exists. A missing file falls back to defaults unless
/// `required` is set.
pub fn load_analytics_config(path: &Path, required: bool) -> Result<AnalyticsConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found: {}", path.display());
        }
        debug!(path = %path.display(), "no config file, using built-in defaults");
        return Ok(AnalyticsConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

pub fn config_json_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(AnalyticsConfig))
        .context("failed to encode config schema")
}

/// [`AnalyticsConfig`] with every pattern compiled.
#[derive(Debug, Clone)]
pub struct AnalyticsRules {
    pub error_labels: ErrorLabels,
    pub steps: Vec<StepRule>,
    pub categories: Vec<CategoryRule>,
    pub template_marker: LikePattern,
    pub excluded_sub_step: String,
    pub channels: ChannelCatalog,
    pub scenarios: Vec<ScenarioRule>,
    pub no_ticket: NoTicketRule,
    pub roster: ProjectRoster,
    pub unknown_user_label: String,
}

impl AnalyticsRules {
    pub fn compile(config: &AnalyticsConfig) -> Result<Self> {
        Ok(Self {
            error_labels: config.error_labels.clone(),
            steps: config
                .steps
                .iter()
                .map(StepRule::compile)
                .collect::<Result<_>>()?,
            categories: config
                .backend_categories
                .iter()
                .map(CategoryRule::compile)
                .collect::<Result<_>>()?,
            template_marker: LikePattern::new(&config.template_marker)
                .context("invalid template marker")?,
            excluded_sub_step: config.excluded_sub_step.clone(),
            channels: config.channels.clone(),
            scenarios: config
                .scenarios
                .iter()
                .map(ScenarioRule::compile)
                .collect::<Result<_>>()?,
            no_ticket: NoTicketRule::compile(&config.no_ticket)?,
            roster: config.project_members.iter().cloned().collect(),
            unknown_user_label: config.unknown_user_label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{AnalyticsConfig, AnalyticsRules, config_json_schema, load_analytics_config};
    use crate::stats::MembershipPolicy;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "querylens-config-{}-{}",
            std::process::id(),
            name
        ));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let path = dir.join("config.json");
        fs::write(&path, contents).expect("config should be writable");
        path
    }

    #[test]
    fn defaults_compile() {
        let rules = AnalyticsRules::compile(&AnalyticsConfig::default())
            .expect("default config should compile");
        let step_names = rules
            .steps
            .iter()
            .map(|step| step.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            step_names,
            vec![
                "INFO_EXTRACTION_LLM",
                "SQL_EXTRACTION_LLM",
                "QUERY_SCHEMA",
                "QUERY_INTENT",
                "SUB_QUERY",
                "RESULT_DEAL",
            ]
        );
        assert_eq!(rules.categories.len(), 5);
        assert_eq!(rules.scenarios.len(), 10);
        assert!(rules.roster.is_empty());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let path = temp_file(
            "partial",
            r#"{"project_members": ["alice"], "excluded_sub_step": "REQ_X"}"#,
        );
        let config = load_analytics_config(&path, true).expect("config should load");
        assert_eq!(config.excluded_sub_step, "REQ_X");
        assert_eq!(config.template_marker, "%###%");

        let rules = AnalyticsRules::compile(&config).expect("config should compile");
        assert!(rules.roster.is_member(Some("alice")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let path = temp_file("unknown", r#"{"project_member": ["alice"]}"#);
        let err = load_analytics_config(&path, true).expect_err("typo should fail");
        assert!(
            format!("{err:#}").contains("unknown field"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn missing_file_is_only_an_error_when_required() {
        let missing = std::env::temp_dir().join("querylens-config-does-not-exist.json");
        assert!(load_analytics_config(&missing, false).is_ok());
        assert!(load_analytics_config(&missing, true).is_err());
    }

    #[test]
    fn schema_names_top_level_fields() {
        let schema = config_json_schema().expect("schema should encode");
        let properties = schema["properties"]
            .as_object()
            .expect("schema should list properties");
        assert!(properties.contains_key("scenarios"));
        assert!(properties.contains_key("project_members"));
    }
}
