use std::collections::BTreeSet;

use serde::Serialize;

/// Decides whether a user belongs to the project team.
///
/// Executions without a user are never members.
pub trait MembershipPolicy: Send + Sync {
    fn is_member(&self, user_id: Option<&str>) -> bool;
}

impl<F> MembershipPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_member(&self, user_id: Option<&str>) -> bool {
        user_id.is_some_and(|user_id| self(user_id))
    }
}

/// Membership backed by a fixed list of user ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRoster {
    members: BTreeSet<String>,
}

impl ProjectRoster {
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProjectRoster {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl MembershipPolicy for ProjectRoster {
    fn is_member(&self, user_id: Option<&str>) -> bool {
        user_id.is_some_and(|user_id| self.members.contains(user_id))
    }
}

/// A count split into project members and everyone else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberSplit {
    pub count: usize,
    pub member_count: usize,
    pub non_member_count: usize,
}

impl MemberSplit {
    pub fn record(&mut self, is_member: bool) {
        self.count += 1;
        if is_member {
            self.member_count += 1;
        } else {
            self.non_member_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemberSplit, MembershipPolicy, ProjectRoster};

    #[test]
    fn roster_rejects_missing_users() {
        let roster = ["alice", "bob"].into_iter().collect::<ProjectRoster>();
        assert!(roster.is_member(Some("alice")));
        assert!(!roster.is_member(Some("carol")));
        assert!(!roster.is_member(None));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn closures_act_as_policies() {
        let policy = |user: &str| user.ends_with("@team");
        assert!(policy.is_member(Some("dana@team")));
        assert!(!policy.is_member(None));
    }

    #[test]
    fn split_counts_both_sides() {
        let mut split = MemberSplit::default();
        for member in [true, false, false] {
            split.record(member);
        }
        assert_eq!(
            split,
            MemberSplit {
                count: 3,
                member_count: 1,
                non_member_count: 2,
            }
        );
    }
}
