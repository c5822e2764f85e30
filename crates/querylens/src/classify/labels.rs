use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Classification, DS_OTHER_SUBCODE, ErrorCategory, Subsystem};

/// Human-readable names for agent category digits and ds subcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorLabels {
    pub agent_types: BTreeMap<String, String>,
    pub ds_business_codes: BTreeMap<String, String>,
    pub ds_system_codes: BTreeMap<String, String>,
    pub ds_other: String,
}

impl Default for ErrorLabels {
    fn default() -> Self {
        Self {
            agent_types: labels(&[
                ("1", "user input missing/invalid"),
                ("2", "user permission issue"),
                ("3", "service call error"),
                ("4", "data access error"),
                ("9", "unexpected internal exception"),
            ]),
            ds_business_codes: labels(&[
                ("1002", "user lacks permission for the subsystem"),
                ("1003", "invalid dbName"),
                ("1004", "empty DCN info, check the subsystem's AOMP onboarding"),
                ("1006", "DCN is not a remote standby"),
                ("1007", "invalid dcn"),
                ("1008", "empty IDC info, check the subsystem's AOMP onboarding"),
                ("1009", "invalid IDC"),
                ("2001", "SQL submission failed"),
                ("2002", "failed to parse table names from SQL"),
            ]),
            ds_system_codes: labels(&[
                ("3001", "AOMP returned an empty result"),
                ("3002", "SQL execution timed out"),
            ]),
            ds_other: "other".to_string(),
        }
    }
}

impl ErrorLabels {
    #[must_use]
    pub fn agent_type(&self, digit: &str) -> String {
        match self.agent_types.get(digit) {
            Some(label) => label.clone(),
            None if digit.is_empty() => "unknown type".to_string(),
            None => format!("unknown type {digit}"),
        }
    }

    #[must_use]
    pub fn ds_business_code(&self, subcode: &str) -> String {
        self.ds_business_codes
            .get(subcode)
            .cloned()
            .unwrap_or_else(|| format!("unknown code {subcode}"))
    }

    #[must_use]
    pub fn ds_system_code(&self, subcode: &str) -> String {
        if subcode == DS_OTHER_SUBCODE {
            return self.ds_other.clone();
        }
        match self.ds_system_codes.get(subcode) {
            Some(label) => label.clone(),
            None => format!("code {subcode}"),
        }
    }

    #[must_use]
    pub fn describe(&self, classification: &Classification) -> String {
        match (classification.subsystem, classification.category) {
            (_, ErrorCategory::Success) => "success".to_string(),
            (Subsystem::Agent, _) => self.agent_type(&classification.subcode),
            (Subsystem::Ds, ErrorCategory::Business) => {
                self.ds_business_code(&classification.subcode)
            }
            (Subsystem::Ds, ErrorCategory::System) => self.ds_system_code(&classification.subcode),
            (Subsystem::Unknown, _) => "unclassified system error".to_string(),
        }
    }
}

fn labels(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, label)| ((*key).to_string(), (*label).to_string()))
        .collect()
}
