use std::collections::BTreeMap;

use serde::Serialize;

use super::channels::ChannelCatalog;
use super::membership::{MemberSplit, MembershipPolicy};
use crate::aggregate::{
    DailyRow, DateWindow, EmptyStepPolicy, StepPerformance, StepRule, bucket_by_day,
    group_by_calendar_day, group_by_step,
};
use crate::models::{ExecutionRecord, StepTiming};
use crate::utils::time::format_date;

/// Executions per day with the member split.
#[must_use]
pub fn query_trend(
    window: &DateWindow,
    executions: &[ExecutionRecord],
    membership: &dyn MembershipPolicy,
) -> Vec<DailyRow<MemberSplit>> {
    let buckets = bucket_by_day(executions, |execution| execution.day());
    group_by_calendar_day(window, &buckets, |day, bucket| {
        let mut split = MemberSplit::default();
        for execution in bucket {
            split.record(membership.is_member(execution.user_id.as_deref()));
        }
        DailyRow {
            date: format_date(day),
            value: split,
        }
    })
}

/// Per-step cost per day. Every configured step gets a row on every day.
#[must_use]
pub fn step_trend(
    window: &DateWindow,
    timings: Vec<StepTiming>,
    executions: Vec<ExecutionRecord>,
    steps: &[StepRule],
) -> Vec<DailyRow<StepPerformance>> {
    let timing_buckets = bucket_by_day(timings, StepTiming::day);
    let execution_buckets = bucket_by_day(executions, ExecutionRecord::day);

    group_by_calendar_day(window, &timing_buckets, |day, timings| {
        let executions = execution_buckets.get(&day).map_or(&[][..], Vec::as_slice);
        let date = format_date(day);
        group_by_step(timings, steps, executions, EmptyStepPolicy::ZeroFill)
            .into_iter()
            .map(|value| DailyRow {
                date: date.clone(),
                value,
            })
            .collect::<Vec<_>>()
    })
    .into_iter()
    .flatten()
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelTrendEntry {
    pub channel: String,
    pub channel_label: String,
    #[serde(flatten)]
    pub split: MemberSplit,
}

/// Per-channel counts per day. Configured channels are zero-filled; the
/// unknown bucket appears only on days that have one. Unlisted channel codes
/// are not reported.
#[must_use]
pub fn channel_trend(
    window: &DateWindow,
    executions: &[ExecutionRecord],
    catalog: &ChannelCatalog,
    membership: &dyn MembershipPolicy,
) -> Vec<DailyRow<ChannelTrendEntry>> {
    let buckets = bucket_by_day(executions, |execution| execution.day());

    group_by_calendar_day(window, &buckets, |day, bucket| {
        let mut splits: BTreeMap<&str, MemberSplit> = BTreeMap::new();
        for execution in bucket {
            splits
                .entry(catalog.key_of(execution))
                .or_default()
                .record(membership.is_member(execution.user_id.as_deref()));
        }

        let date = format_date(day);
        let mut rows = catalog
            .channels
            .iter()
            .map(|channel| DailyRow {
                date: date.clone(),
                value: ChannelTrendEntry {
                    channel: channel.code.clone(),
                    channel_label: channel.label.clone(),
                    split: splits
                        .get(channel.code.as_str())
                        .copied()
                        .unwrap_or_default(),
                },
            })
            .collect::<Vec<_>>();
        if let Some(split) = splits.get(catalog.unknown_label.as_str()) {
            rows.push(DailyRow {
                date,
                value: ChannelTrendEntry {
                    channel: catalog.unknown_label.clone(),
                    channel_label: catalog.unknown_label.clone(),
                    split: *split,
                },
            });
        }
        rows
    })
    .into_iter()
    .flatten()
    .collect()
}
