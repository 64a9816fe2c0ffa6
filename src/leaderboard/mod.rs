//! Direction-aware leaderboards over verified results.

pub mod aggregator;
pub mod types;

pub use aggregator::{LeaderboardError, LeaderboardService};
pub use types::{LeaderboardEntry, TimeWindow};
