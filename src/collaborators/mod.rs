//! Seams to the surrounding platform: user directory, notifications, feed.
//!
//! The engine never talks to the platform directly; it goes through these
//! traits so tests and embedders can plug in their own transports.

pub mod notifier;

pub use notifier::{ChannelNotifier, NotificationEvent, NotificationSink, ThreadedNotifier};

use std::collections::HashMap;
use uuid::Uuid;

use crate::results::types::UserTestResult;
use crate::catalog::types::TestCategory;

/// Display attributes for one user, resolved from the platform directory.
#[derive(Debug, Clone, Default)]
pub struct DisplayInfo {
    pub full_name: String,
    pub face_image: Option<String>,
    pub club_id: Option<Uuid>,
    pub club_name: Option<String>,
}

/// Population constraints a leaderboard can be scoped to.
#[derive(Debug, Clone, Default)]
pub struct PopulationFilter {
    /// Explicit allowlist of users, e.g. "compare me with my friends".
    pub user_ids: Option<Vec<Uuid>>,
    pub team_id: Option<Uuid>,
    pub country: Option<String>,
    pub age_group: Option<String>,
    pub role: Option<String>,
}

impl PopulationFilter {
    /// Scope to a single team.
    pub fn team(team_id: Uuid) -> Self {
        Self {
            team_id: Some(team_id),
            ..Default::default()
        }
    }

    /// True when no constraint is set and every user qualifies.
    pub fn is_unconstrained(&self) -> bool {
        self.user_ids.is_none()
            && self.team_id.is_none()
            && self.country.is_none()
            && self.age_group.is_none()
            && self.role.is_none()
    }
}

/// Read access to the platform's user records.
pub trait UserDirectory {
    /// Display attributes for the given users. Unknown IDs are simply absent
    /// from the map; ranking never fails because a profile is missing.
    fn display_info(&self, user_ids: &[Uuid]) -> HashMap<Uuid, DisplayInfo>;

    /// Users matching a population filter, or `None` when the filter is
    /// unconstrained and pre-filtering would be pointless.
    fn resolve(&self, filter: &PopulationFilter) -> Option<Vec<Uuid>>;

    /// Members of a team, for team-level charts and rankings.
    fn team_members(&self, team_id: &Uuid) -> Vec<Uuid>;
}

/// Outbound feed for publicly shared results.
pub trait FeedPublisher {
    fn publish(&self, result: &UserTestResult, category: TestCategory);
}

/// Directory that knows nobody. Used where enrichment is optional.
#[derive(Debug, Default)]
pub struct EmptyDirectory;

impl UserDirectory for EmptyDirectory {
    fn display_info(&self, _user_ids: &[Uuid]) -> HashMap<Uuid, DisplayInfo> {
        HashMap::new()
    }

    fn resolve(&self, _filter: &PopulationFilter) -> Option<Vec<Uuid>> {
        None
    }

    fn team_members(&self, _team_id: &Uuid) -> Vec<Uuid> {
        Vec::new()
    }
}

/// Feed that swallows everything.
#[derive(Debug, Default)]
pub struct NullFeed;

impl FeedPublisher for NullFeed {
    fn publish(&self, result: &UserTestResult, category: TestCategory) {
        tracing::debug!(
            result_id = %result.id,
            category = %category,
            "Feed publishing disabled, dropping share"
        );
    }
}
