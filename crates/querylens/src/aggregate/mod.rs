//! Cost aggregation over step timing samples.
//!
//! Every function here is pure: inputs are borrowed record slices, outputs are
//! owned serializable rows. Costs are milliseconds.

pub mod calendar;
pub mod categories;
pub mod steps;

use serde::Serialize;

pub use calendar::{
    DEFAULT_TREND_DAYS, DailyRow, DateWindow, bucket_by_day, group_by_calendar_day,
};
pub use categories::{
    CategoryDefinition, CategoryInputs, CategoryPerformance, CategoryRule, EnvironmentFilter,
    QueryKind, group_by_category,
};
pub use steps::{EmptyStepPolicy, StepDefinition, StepPerformance, StepRule, group_by_step};

const P90_QUANTILE: f64 = 0.9;

/// Rounds half away from zero to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Linearly interpolated 90th percentile at position `0.9 * (n - 1)`.
///
/// Not rounded. Empty input yields `0`.
#[must_use]
pub fn percentile90(samples: &[f64]) -> f64 {
    match samples {
        [] => 0.0,
        [only] => *only,
        _ => {
            let mut sorted = samples.to_vec();
            sorted.sort_by(f64::total_cmp);

            let last = sorted.len() - 1;
            let position = P90_QUANTILE * last as f64;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(last);
            let fraction = position - lower as f64;
            if fraction == 0.0 {
                return sorted[lower];
            }
            sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub avg_cost: f64,
    pub max_cost: f64,
    pub p90_cost: f64,
}

impl CostSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Mean, maximum and P90 of the finite samples, each rounded to two decimals.
#[must_use]
pub fn aggregate(samples: &[f64]) -> CostSummary {
    let finite = samples
        .iter()
        .copied()
        .filter(|sample| sample.is_finite())
        .collect::<Vec<_>>();
    if finite.is_empty() {
        return CostSummary::default();
    }

    let sum: f64 = finite.iter().sum();
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    CostSummary {
        avg_cost: round2(sum / finite.len() as f64),
        max_cost: round2(max),
        p90_cost: round2(percentile90(&finite)),
    }
}
