//! Snapshot rollup.
//!
//! T023: Rebuild the per-category snapshot after each verification

use crate::catalog::types::TestCategory;
use crate::scoring::classifier::classify;
use crate::snapshot::types::{ResultSnapshot, SnapshotEntry, NO_RESULT_POINT};
use crate::storage::database::Database;
use crate::storage::DatabaseError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Maintains the single "latest known aggregate" row per user and category.
pub struct SnapshotService {
    db: Arc<Database>,
}

impl SnapshotService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Recompute and overwrite the snapshot for one user and category.
    ///
    /// One entry per active subtype carries the user's best verified point
    /// there, or [`NO_RESULT_POINT`] when none exists. Sentinel entries are
    /// listed but excluded from the average.
    pub fn rollup(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
        verified_at: DateTime<Utc>,
    ) -> Result<ResultSnapshot, SnapshotError> {
        let subtypes = self.db.list_subtypes(Some(test_type), false)?;

        let mut entries = Vec::with_capacity(subtypes.len());
        let mut sum = 0.0;
        let mut counted = 0usize;

        for subtype in subtypes {
            let point = self
                .db
                .best_verified_point(user_id, &subtype.id)?
                .unwrap_or(NO_RESULT_POINT);

            if point != NO_RESULT_POINT {
                sum += point;
                counted += 1;
            }

            entries.push(SnapshotEntry {
                subtype_id: subtype.id,
                subtype_name: subtype.subtype_name,
                point,
            });
        }

        let avg_point = if counted > 0 { sum / counted as f64 } else { 0.0 };

        let snapshot = ResultSnapshot {
            id: Uuid::new_v4(),
            test_type,
            user_id: *user_id,
            avg_point,
            level: classify(avg_point),
            entries,
            verified_at,
        };
        self.db.upsert_snapshot(&snapshot)?;

        tracing::debug!(
            user = %user_id,
            %test_type,
            avg_point,
            "snapshot rebuilt"
        );
        Ok(snapshot)
    }

    /// Latest snapshot for a user and category, if one was ever built.
    pub fn get(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
    ) -> Result<Option<ResultSnapshot>, SnapshotError> {
        Ok(self.db.get_snapshot(user_id, test_type)?)
    }
}

/// Snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SnapshotError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotError::Database(e) => e.code(),
        }
    }
}
