use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::ExecutionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCount {
    pub user_id: String,
    pub count: usize,
    pub rank: usize,
}

/// Executions per user, most active first and ranked from 1. Executions
/// without a user, or with an empty one, are pooled under `unknown_user`.
#[must_use]
pub fn rank_users(executions: &[ExecutionRecord], unknown_user: &str) -> Vec<UserCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for execution in executions {
        let user = execution
            .user_id
            .as_deref()
            .filter(|user_id| !user_id.is_empty())
            .unwrap_or(unknown_user);
        *counts.entry(user).or_default() += 1;
    }

    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, left), (_, right)| right.cmp(left));
    ranked
        .into_iter()
        .enumerate()
        .map(|(index, (user_id, count))| UserCount {
            user_id: user_id.to_string(),
            count,
            rank: index + 1,
        })
        .collect()
}
