//! Result-code classification.
//!
//! Two entry points exist on purpose: [`classify`] applies the per-subsystem
//! rules used by the agent/ds breakdowns and drill-down views, while
//! [`classify_strict`] additionally rejects any failure code that is not
//! exactly eight characters long before looking at its prefix. The combined
//! business/system counts use the strict variant.

pub mod details;
pub mod labels;
pub mod rates;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use details::{
    AgentErrorDetails, AgentErrorType, CodeGroup, DsCodeGroup, DsErrorDetails, ErrorRecordDetail,
    group_agent_errors, group_ds_errors,
};
pub use labels::ErrorLabels;
pub use rates::{
    CombinedErrorStats, OverallStats, QueryStats, SubsystemErrorStats, SuccessRates,
    compute_query_stats,
};

pub const SUCCESS_SENTINEL: &str = "0000";
pub const AGENT_PREFIX: &str = "B2DU";
pub const DS_PREFIX: &str = "2030";
pub const STRICT_CODE_LEN: usize = 8;
pub const DS_BUSINESS_SUBCODES: &[&str] = &["1002", "1003", "1004", "1006", "1007", "1008", "1009"];
pub const DS_SYSTEM_SUBCODES: &[&str] = &["3001", "3002"];
pub const DS_OTHER_SUBCODE: &str = "9999";

const PREFIX_LEN: usize = 4;
const AGENT_CATEGORY_DIGIT_INDEX: usize = 6;
const DS_SUBCODE_RANGE: std::ops::Range<usize> = 4..8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Success,
    Business,
    System,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Business => "business",
            Self::System => "system",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Agent,
    Ds,
    Unknown,
}

impl Subsystem {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Ds => "ds",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub subsystem: Subsystem,
    /// Agent: the category digit. Ds: the four-digit subcode (`9999` for
    /// unrecognised system subcodes). Empty when not applicable.
    pub subcode: String,
}

impl Classification {
    fn success() -> Self {
        Self {
            category: ErrorCategory::Success,
            subsystem: Subsystem::Unknown,
            subcode: String::new(),
        }
    }

    fn unknown_system() -> Self {
        Self {
            category: ErrorCategory::System,
            subsystem: Subsystem::Unknown,
            subcode: String::new(),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.category != ErrorCategory::Success
    }
}

/// Empty codes, the sentinel and anything carrying `0000` count as success.
#[must_use]
pub fn is_success_code(code: &str) -> bool {
    code.is_empty() || code == SUCCESS_SENTINEL || code.contains(SUCCESS_SENTINEL)
}

#[must_use]
pub fn has_agent_prefix(code: &str) -> bool {
    code.get(..PREFIX_LEN) == Some(AGENT_PREFIX)
}

#[must_use]
pub fn has_ds_prefix(code: &str) -> bool {
    code.get(..PREFIX_LEN) == Some(DS_PREFIX)
}

#[must_use]
pub fn classify(code: &str) -> Classification {
    if is_success_code(code) {
        return Classification::success();
    }
    if has_agent_prefix(code) {
        return classify_agent(code);
    }
    if has_ds_prefix(code) {
        return classify_ds(code);
    }
    Classification::unknown_system()
}

#[must_use]
pub fn classify_strict(code: &str) -> Classification {
    if is_success_code(code) {
        return Classification::success();
    }
    if code.chars().count() != STRICT_CODE_LEN {
        return Classification::unknown_system();
    }
    classify(code)
}

/// The 7th character of an agent code, if the code is long enough.
#[must_use]
pub fn agent_category_digit(code: &str) -> Option<char> {
    code.chars().nth(AGENT_CATEGORY_DIGIT_INDEX)
}

#[must_use]
pub fn is_ds_business_subcode(subcode: &str) -> bool {
    DS_BUSINESS_SUBCODES.contains(&subcode)
}

/// Last four characters of a code, or the whole code when shorter.
#[must_use]
pub fn trailing_code(code: &str) -> &str {
    let start = code
        .char_indices()
        .rev()
        .nth(PREFIX_LEN - 1)
        .map_or(0, |(index, _)| index);
    &code[start..]
}

fn classify_agent(code: &str) -> Classification {
    let digit = agent_category_digit(code);
    let category = match digit {
        Some('1' | '2') => ErrorCategory::Business,
        _ => ErrorCategory::System,
    };
    Classification {
        category,
        subsystem: Subsystem::Agent,
        subcode: digit.map(String::from).unwrap_or_default(),
    }
}

fn classify_ds(code: &str) -> Classification {
    let Some(subcode) = code.get(DS_SUBCODE_RANGE) else {
        return Classification {
            category: ErrorCategory::System,
            subsystem: Subsystem::Ds,
            subcode: DS_OTHER_SUBCODE.to_string(),
        };
    };

    if is_ds_business_subcode(subcode) {
        return Classification {
            category: ErrorCategory::Business,
            subsystem: Subsystem::Ds,
            subcode: subcode.to_string(),
        };
    }

    let subcode = if DS_SYSTEM_SUBCODES.contains(&subcode) {
        subcode
    } else {
        DS_OTHER_SUBCODE
    };
    Classification {
        category: ErrorCategory::System,
        subsystem: Subsystem::Ds,
        subcode: subcode.to_string(),
    }
}
