//! Result snapshot types.

use crate::catalog::types::TestCategory;
use crate::scoring::classifier::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel for a subtype with no verified result yet; excluded from the
/// snapshot average rather than counted as zero.
pub const NO_RESULT_POINT: f64 = -1.0;

/// One subtype line in a snapshot listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub subtype_id: Uuid,
    pub subtype_name: String,
    /// Best verified point in the subtype, or [`NO_RESULT_POINT`].
    pub point: f64,
}

/// Materialized "latest known aggregate" per user and category.
///
/// Overwritten in place on every successful verification; not a history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub id: Uuid,
    pub test_type: TestCategory,
    pub user_id: Uuid,
    pub avg_point: f64,
    pub level: Level,
    pub entries: Vec<SnapshotEntry>,
    pub verified_at: DateTime<Utc>,
}
