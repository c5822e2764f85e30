use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::membership::MembershipPolicy;
use crate::models::ExecutionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChannelDefinition {
    pub code: String,
    pub label: String,
}

/// Known channels in display order plus the bucket for executions without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelCatalog {
    pub channels: Vec<ChannelDefinition>,
    pub unknown_label: String,
}

impl Default for ChannelCatalog {
    fn default() -> Self {
        let channel = |code: &str, label: &str| ChannelDefinition {
            code: code.to_string(),
            label: label.to_string(),
        };
        Self {
            channels: vec![
                channel("DKK", "DKK"),
                channel("DQ_WEB", "DQ web"),
                channel("DQ_QW", "DQ work chat"),
                channel("WXB-_QW", "WXB work chat"),
                channel("XQ_DIFY", "XQ Dify"),
            ],
            unknown_label: "unknown channel".to_string(),
        }
    }
}

impl ChannelCatalog {
    /// Grouping key of an execution; missing or empty channels share the
    /// unknown bucket.
    #[must_use]
    pub fn key_of<'a>(&'a self, execution: &'a ExecutionRecord) -> &'a str {
        execution
            .channel
            .as_deref()
            .filter(|channel| !channel.is_empty())
            .unwrap_or(&self.unknown_label)
    }

    /// Configured label, or the key itself for unlisted channels.
    #[must_use]
    pub fn label_of(&self, key: &str) -> String {
        self.channels
            .iter()
            .find(|channel| channel.code == key)
            .map_or_else(|| key.to_string(), |channel| channel.label.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelCount {
    pub channel: String,
    pub channel_label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub query_date: String,
    pub member_stats: Vec<ChannelCount>,
    pub non_member_stats: Vec<ChannelCount>,
}

#[must_use]
pub fn channel_stats(
    query_date: &str,
    executions: &[ExecutionRecord],
    catalog: &ChannelCatalog,
    membership: &dyn MembershipPolicy,
) -> ChannelStats {
    let mut members: BTreeMap<&str, usize> = BTreeMap::new();
    let mut non_members: BTreeMap<&str, usize> = BTreeMap::new();
    for execution in executions {
        let side = if membership.is_member(execution.user_id.as_deref()) {
            &mut members
        } else {
            &mut non_members
        };
        *side.entry(catalog.key_of(execution)).or_default() += 1;
    }

    ChannelStats {
        query_date: query_date.to_string(),
        member_stats: ranked(members, catalog),
        non_member_stats: ranked(non_members, catalog),
    }
}

fn ranked(counts: BTreeMap<&str, usize>, catalog: &ChannelCatalog) -> Vec<ChannelCount> {
    let mut rows = counts
        .into_iter()
        .map(|(channel, count)| ChannelCount {
            channel: channel.to_string(),
            channel_label: catalog.label_of(channel),
            count,
        })
        .collect::<Vec<_>>();
    // Ties keep channel order from the map.
    rows.sort_by(|left, right| right.count.cmp(&left.count));
    rows
}
