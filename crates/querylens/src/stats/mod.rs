//! Distribution statistics over execution records: channels, scenarios,
//! users, ticket-free queries, daily trends and per-execution detail.

pub mod channels;
pub mod detail;
pub mod membership;
pub mod scenarios;
pub mod tickets;
pub mod trends;
pub mod users;

pub use channels::{ChannelCatalog, ChannelCount, ChannelDefinition, ChannelStats, channel_stats};
pub use detail::{DetailStep, PerformanceDetail, performance_detail};
pub use membership::{MemberSplit, MembershipPolicy, ProjectRoster};
pub use scenarios::{
    Condition, PayloadField, ScenarioCount, ScenarioDefinition, ScenarioRule, default_scenarios,
    scenario_stats,
};
pub use tickets::{NoTicketDefinition, NoTicketRule, NoTicketStats, no_ticket_stats};
pub use trends::{ChannelTrendEntry, channel_trend, query_trend, step_trend};
pub use users::{UserCount, rank_users};
