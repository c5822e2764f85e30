use serde::Serialize;

use super::{
    ErrorCategory, Subsystem, agent_category_digit, classify, classify_strict, has_agent_prefix,
    is_success_code,
};
use crate::aggregate::round2;

/// Business/system success rates derived from failure counts over a total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SuccessRates {
    pub business_success_rate: f64,
    pub system_success_rate: f64,
}

impl SuccessRates {
    /// `(1 - failures / total) * 100`, and `0` for both when `total == 0`.
    #[must_use]
    pub fn from_counts(total: usize, business_errors: usize, system_errors: usize) -> Self {
        if total == 0 {
            return Self {
                business_success_rate: 0.0,
                system_success_rate: 0.0,
            };
        }
        let total = total as f64;
        Self {
            business_success_rate: round2((1.0 - business_errors as f64 / total) * 100.0),
            system_success_rate: round2((1.0 - system_errors as f64 / total) * 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubsystemErrorStats {
    pub business_error_count: usize,
    pub business_success_rate: f64,
    pub system_error_count: usize,
    pub system_success_rate: f64,
}

impl SubsystemErrorStats {
    fn from_counts(total: usize, business_errors: usize, system_errors: usize) -> Self {
        let rates = SuccessRates::from_counts(total, business_errors, system_errors);
        Self {
            business_error_count: business_errors,
            business_success_rate: rates.business_success_rate,
            system_error_count: system_errors,
            system_success_rate: rates.system_success_rate,
        }
    }
}

pub type CombinedErrorStats = SubsystemErrorStats;

/// The combined statistics view: overall, strict business/system, agent and ds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStats {
    pub query_date: String,
    pub overall: OverallStats,
    pub combined: CombinedErrorStats,
    pub agent: SubsystemErrorStats,
    pub ds: SubsystemErrorStats,
}

#[derive(Debug, Default)]
struct Tally {
    business: usize,
    system: usize,
}

impl Tally {
    fn record(&mut self, category: ErrorCategory) {
        match category {
            ErrorCategory::Business => self.business += 1,
            ErrorCategory::System => self.system += 1,
            ErrorCategory::Success => {}
        }
    }
}

/// Computes [`QueryStats`] over every result code logged in one window.
///
/// Failures without the agent prefix all count against the ds subsystem; only
/// allow-listed `2030` subcodes among them are business errors.
pub fn compute_query_stats<'a, I>(query_date: &str, codes: I) -> QueryStats
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut total = 0usize;
    let mut success = 0usize;
    let mut combined = Tally::default();
    let mut agent = Tally::default();
    let mut ds = Tally::default();

    for code in codes {
        total += 1;
        let code = code.unwrap_or("");
        if is_success_code(code) {
            success += 1;
            continue;
        }

        combined.record(classify_strict(code).category);

        if has_agent_prefix(code) {
            match agent_category_digit(code) {
                Some('1' | '2') => agent.business += 1,
                _ => agent.system += 1,
            }
            continue;
        }

        let classification = classify(code);
        match (classification.subsystem, classification.category) {
            (Subsystem::Ds, ErrorCategory::Business) => ds.business += 1,
            _ => ds.system += 1,
        }
    }

    let success_rate = if total == 0 {
        0.0
    } else {
        round2(success as f64 / total as f64 * 100.0)
    };

    QueryStats {
        query_date: query_date.to_string(),
        overall: OverallStats {
            total_count: total,
            success_count: success,
            failure_count: total - success,
            success_rate,
        },
        combined: SubsystemErrorStats::from_counts(total, combined.business, combined.system),
        agent: SubsystemErrorStats::from_counts(total, agent.business, agent.system),
        ds: SubsystemErrorStats::from_counts(total, ds.business, ds.system),
    }
}
