//! Leaderboard types.

use crate::collaborators::DisplayInfo;
use crate::scoring::classifier::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Half-open ranking window `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The trailing window of the given number of days, ending now.
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// One ranked row, enriched with directory attributes when available.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position within the full ranking.
    pub rank: usize,
    pub user_id: Uuid,
    pub full_name: String,
    pub face_image: Option<String>,
    pub club_id: Option<Uuid>,
    pub club_name: Option<String>,
    /// The raw value that earned the rank.
    pub value: f64,
    pub metric: String,
    pub point: f64,
    pub level: Level,
    pub executed_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub(crate) fn apply_display(&mut self, info: &DisplayInfo) {
        self.full_name = info.full_name.clone();
        self.face_image = info.face_image.clone();
        self.club_id = info.club_id;
        self.club_name = info.club_name.clone();
    }
}
