use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use time::{Date, Duration};

use crate::utils::time::{format_date, window_bounds};

/// Trend views default to this many days ending today, inclusive.
pub const DEFAULT_TREND_DAYS: i64 = 7;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    #[must_use]
    pub const fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn single(day: Date) -> Self {
        Self::new(day, day)
    }

    /// Fills missing bounds: `end` defaults to `today`, `start` to six days
    /// before `end`.
    #[must_use]
    pub fn resolve(start: Option<Date>, end: Option<Date>, today: Date) -> Self {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| {
            end.checked_sub(Duration::days(DEFAULT_TREND_DAYS - 1))
                .unwrap_or(Date::MIN)
        });
        Self::new(start, end)
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Every day in the window in ascending order; empty when inverted.
    #[must_use]
    pub fn days(&self) -> Vec<Date> {
        let mut days = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            days.push(current);
            match current.next_day() {
                Some(next) => current = next,
                None => break,
            }
        }
        days
    }

    /// Half-open text bounds `[start, end + 1 day)` for `create_time` filters.
    pub fn text_bounds(&self) -> Result<(String, String)> {
        window_bounds(self.start, self.end)
    }

    #[must_use]
    pub fn label(&self) -> String {
        if self.start == self.end {
            format_date(self.start)
        } else {
            format!("{}..{}", format_date(self.start), format_date(self.end))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow<T> {
    pub date: String,
    #[serde(flatten)]
    pub value: T,
}

/// Moves records into per-day buckets. Records without a readable day are
/// dropped.
pub fn bucket_by_day<R>(
    records: impl IntoIterator<Item = R>,
    day_of: impl Fn(&R) -> Option<Date>,
) -> BTreeMap<Date, Vec<R>> {
    let mut buckets: BTreeMap<Date, Vec<R>> = BTreeMap::new();
    for record in records {
        if let Some(day) = day_of(&record) {
            buckets.entry(day).or_default().push(record);
        }
    }
    buckets
}

/// Calls `per_day` once for each day in `window`, ascending, with that day's
/// bucket (empty when nothing was recorded). Days outside the window are
/// ignored.
pub fn group_by_calendar_day<R, T>(
    window: &DateWindow,
    buckets: &BTreeMap<Date, Vec<R>>,
    mut per_day: impl FnMut(Date, &[R]) -> T,
) -> Vec<T> {
    window
        .days()
        .into_iter()
        .map(|day| {
            let bucket = buckets.get(&day).map_or(&[][..], Vec::as_slice);
            per_day(day, bucket)
        })
        .collect()
}
