//! Trend chart construction.
//!
//! T026: Six-bucket progress charts per test, category and team
//!
//! Every chart is a fixed run of contiguous windows ending now, oldest
//! first. A window without data renders as a zero node rather than a gap so
//! clients always draw the same number of points.

use crate::catalog::types::{Direction, TestCategory};
use crate::collaborators::UserDirectory;
use crate::results::types::UserTestResult;
use crate::scoring::classifier::{classify, Level};
use crate::snapshot::service::{SnapshotError, SnapshotService};
use crate::storage::database::Database;
use crate::storage::DatabaseError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Fixed number of nodes in every chart.
pub const NUMBER_OF_POINTS_IN_CHART: usize = 6;

/// Default span of one chart window.
const DEFAULT_BUCKET_DAYS: i64 = 30;

/// One chart node, oldest window first.
#[derive(Debug, Clone, Serialize)]
pub struct NodeChart {
    /// 0-based window index; the last index is the most recent window.
    pub index: usize,
    pub point: f64,
    pub level: Level,
    /// Window label, "<from> - <to>".
    pub day: String,
}

impl NodeChart {
    fn empty(index: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            index,
            point: 0.0,
            level: Level::Amateur,
            day: label(start, end),
        }
    }
}

fn label(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!("{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

/// Builds trend charts from verified results and snapshots.
pub struct ChartService {
    db: Arc<Database>,
    snapshots: Arc<SnapshotService>,
    directory: Arc<dyn UserDirectory>,
    bucket_days: i64,
}

impl ChartService {
    pub fn new(
        db: Arc<Database>,
        snapshots: Arc<SnapshotService>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            db,
            snapshots,
            directory,
            bucket_days: DEFAULT_BUCKET_DAYS,
        }
    }

    pub fn with_bucket_days(mut self, days: i64) -> Self {
        self.bucket_days = days.max(1);
        self
    }

    /// Windows `[start, end)` covering the chart, oldest first, the last one
    /// ending now.
    fn windows(&self, now: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        (0..NUMBER_OF_POINTS_IN_CHART)
            .map(|i| {
                let back = (NUMBER_OF_POINTS_IN_CHART - i) as i64;
                let start = now - Duration::days(back * self.bucket_days);
                let end = start + Duration::days(self.bucket_days);
                (start, end)
            })
            .collect()
    }

    /// Node for the newest, still-open window: the current snapshot average
    /// for the category, not a re-scan of raw history.
    fn snapshot_node(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
        index: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<NodeChart, ChartError> {
        Ok(match self.snapshots.get(user_id, test_type)? {
            Some(snapshot) => NodeChart {
                index,
                point: snapshot.avg_point,
                level: snapshot.level,
                day: label(start, end),
            },
            None => NodeChart::empty(index, start, end),
        })
    }

    /// Progress on a single test: the first five nodes carry the point of the
    /// user's best attempt in their window, best judged by the test's
    /// direction; the newest node shows the current category snapshot average.
    pub fn test_chart(
        &self,
        user_id: &Uuid,
        test_id: &Uuid,
    ) -> Result<Vec<NodeChart>, ChartError> {
        let test = self
            .db
            .get_test(test_id)?
            .ok_or(ChartError::TestNotFound(*test_id))?;
        let test_type = self
            .db
            .test_category(test_id)?
            .ok_or(ChartError::TestNotFound(*test_id))?;

        let now = Utc::now();
        let mut nodes = Vec::with_capacity(NUMBER_OF_POINTS_IN_CHART);

        for (index, (start, end)) in self.windows(now).into_iter().enumerate() {
            if index == NUMBER_OF_POINTS_IN_CHART - 1 {
                nodes.push(self.snapshot_node(user_id, test_type, index, start, end)?);
                continue;
            }

            let results = self
                .db
                .user_results_for_test_in_window(user_id, test_id, start, end)?;

            let best = results.into_iter().reduce(|a, b| {
                let b_better = match test.direction {
                    Direction::Increasing => b.value > a.value,
                    Direction::Decreasing => b.value < a.value,
                };
                if b_better {
                    b
                } else {
                    a
                }
            });

            nodes.push(match best {
                Some(result) => NodeChart {
                    index,
                    point: result.point,
                    level: result.level,
                    day: label(start, end),
                },
                None => NodeChart::empty(index, start, end),
            });
        }

        Ok(nodes)
    }

    /// Progress across a whole category. The first five nodes carry the best
    /// point scored in their window; the newest node shows the current
    /// snapshot average, so the chart ends where the profile header begins.
    pub fn category_chart(
        &self,
        user_id: &Uuid,
        test_type: TestCategory,
    ) -> Result<Vec<NodeChart>, ChartError> {
        let now = Utc::now();
        let windows = self.windows(now);
        let mut nodes = Vec::with_capacity(NUMBER_OF_POINTS_IN_CHART);

        for (index, (start, end)) in windows.iter().copied().enumerate() {
            if index == NUMBER_OF_POINTS_IN_CHART - 1 {
                nodes.push(self.snapshot_node(user_id, test_type, index, start, end)?);
                continue;
            }

            let results =
                self.db
                    .user_results_for_category_in_window(user_id, test_type, start, end)?;

            let best = results
                .into_iter()
                .reduce(|a, b| if b.point > a.point { b } else { a });

            nodes.push(match best {
                Some(result) => NodeChart {
                    index,
                    point: result.point,
                    level: result.level,
                    day: label(start, end),
                },
                None => NodeChart::empty(index, start, end),
            });
        }

        Ok(nodes)
    }

    /// Team progress across a category: for each window end, average the
    /// latest point per member and subtype known at that moment. Buckets are
    /// cumulative, so the curve reflects the squad's standing over time
    /// rather than per-window activity.
    pub fn team_chart(
        &self,
        team_id: &Uuid,
        test_type: TestCategory,
    ) -> Result<Vec<NodeChart>, ChartError> {
        let members = self.directory.team_members(team_id);
        let now = Utc::now();
        let windows = self.windows(now);

        if members.is_empty() {
            return Ok(windows
                .into_iter()
                .enumerate()
                .map(|(i, (start, end))| NodeChart::empty(i, start, end))
                .collect());
        }

        // Ascending by executed_at, so replaying rows keeps the latest
        // point per (member, subtype) as of any cutoff.
        let rows = self.db.results_for_category_until(test_type, now)?;
        let member_rows: Vec<&UserTestResult> = rows
            .iter()
            .filter(|r| members.contains(&r.user_id))
            .collect();

        let mut latest: HashMap<(Uuid, Uuid), f64> = HashMap::new();
        let mut cursor = 0usize;
        let mut nodes = Vec::with_capacity(NUMBER_OF_POINTS_IN_CHART);

        for (index, (start, end)) in windows.into_iter().enumerate() {
            while cursor < member_rows.len() && member_rows[cursor].executed_at < end {
                let row = member_rows[cursor];
                latest.insert((row.user_id, row.subtype_id), row.point);
                cursor += 1;
            }

            if latest.is_empty() {
                nodes.push(NodeChart::empty(index, start, end));
            } else {
                let avg = latest.values().sum::<f64>() / latest.len() as f64;
                nodes.push(NodeChart {
                    index,
                    point: avg,
                    level: classify(avg),
                    day: label(start, end),
                });
            }
        }

        Ok(nodes)
    }
}

/// Chart errors.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Test {0} not found")]
    TestNotFound(Uuid),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ChartError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            ChartError::TestNotFound(_) => "CHART_TEST_NOT_FOUND",
            ChartError::Snapshot(e) => e.code(),
            ChartError::Database(e) => e.code(),
        }
    }
}
