//! Leaderboard aggregation.
//!
//! T025: Rank verified results per test, direction-aware
//!
//! Only verified, non-deleted results inside the window compete. Each user
//! is represented once, by their best attempt; ties between attempts go to
//! the more recent one.

use crate::catalog::types::Direction;
use crate::collaborators::{PopulationFilter, UserDirectory};
use crate::leaderboard::types::{LeaderboardEntry, TimeWindow};
use crate::results::types::UserTestResult;
use crate::storage::database::Database;
use crate::storage::DatabaseError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Ranks verified results and enriches rows from the user directory.
pub struct LeaderboardService {
    db: Arc<Database>,
    directory: Arc<dyn UserDirectory>,
    /// Directory lookups are chunked to keep request sizes bounded.
    display_batch_size: usize,
}

impl LeaderboardService {
    pub fn new(db: Arc<Database>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            db,
            directory,
            display_batch_size: 100,
        }
    }

    pub fn with_display_batch_size(mut self, size: usize) -> Self {
        self.display_batch_size = size.max(1);
        self
    }

    /// Rank one test over a window.
    ///
    /// Pages are cumulative: page n returns everything from the first row of
    /// page n up to the end of page 2n-1, so clients render a growing board
    /// without stitching. Ranks stay absolute regardless of the page.
    pub fn rank(
        &self,
        test_id: &Uuid,
        window: TimeWindow,
        filter: &PopulationFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        if !window.is_valid() {
            return Err(LeaderboardError::InvalidWindow);
        }
        if page == 0 || page_size == 0 {
            return Err(LeaderboardError::InvalidPage);
        }

        let test = self
            .db
            .get_test(test_id)?
            .filter(|t| !t.is_deleted)
            .ok_or(LeaderboardError::TestNotFound(*test_id))?;

        let mut results = self
            .db
            .results_for_test_in_window(test_id, window.start, window.end)?;

        // An unconstrained filter matches everyone; skip the directory trip.
        if !filter.is_unconstrained() {
            if let Some(population) = self.directory.resolve(filter) {
                let allowed: HashSet<Uuid> = population.into_iter().collect();
                results.retain(|r| allowed.contains(&r.user_id));
            }
        }

        let mut best: HashMap<Uuid, UserTestResult> = HashMap::new();
        for result in results {
            let replace = match best.get(&result.user_id) {
                Some(current) => beats(&result, current, test.direction),
                None => true,
            };
            if replace {
                best.insert(result.user_id, result);
            }
        }

        let mut ranked: Vec<UserTestResult> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            let primary = match test.direction {
                Direction::Increasing => b
                    .value
                    .partial_cmp(&a.value)
                    .unwrap_or(std::cmp::Ordering::Equal),
                Direction::Decreasing => a
                    .value
                    .partial_cmp(&b.value)
                    .unwrap_or(std::cmp::Ordering::Equal),
            };
            primary.then_with(|| b.executed_at.cmp(&a.executed_at))
        });

        let skip = page_size * (page - 1);
        let limit = page_size * page;
        if skip >= ranked.len() {
            return Ok(Vec::new());
        }
        let end = ranked.len().min(skip + limit);

        let mut entries: Vec<LeaderboardEntry> = ranked[skip..end]
            .iter()
            .enumerate()
            .map(|(i, result)| LeaderboardEntry {
                rank: skip + i + 1,
                user_id: result.user_id,
                full_name: String::new(),
                face_image: None,
                club_id: None,
                club_name: None,
                value: result.value,
                metric: result.metric.clone(),
                point: result.point,
                level: result.level,
                executed_at: result.executed_at,
            })
            .collect();

        self.enrich(&mut entries);

        tracing::debug!(
            test = %test_id,
            rows = entries.len(),
            page,
            "leaderboard built"
        );
        Ok(entries)
    }

    /// Team-scoped dual leaderboard: two fixed tests, typically one with an
    /// increasing and one with a decreasing direction, ranked over the same
    /// window and team. Built sequentially; a failure on either side fails
    /// the pair.
    pub fn team_dual_rank(
        &self,
        team_id: &Uuid,
        first_test_id: &Uuid,
        second_test_id: &Uuid,
        window: TimeWindow,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<LeaderboardEntry>, Vec<LeaderboardEntry>), LeaderboardError> {
        let filter = PopulationFilter::team(*team_id);
        let first = self.rank(first_test_id, window, &filter, page, page_size)?;
        let second = self.rank(second_test_id, window, &filter, page, page_size)?;
        Ok((first, second))
    }

    /// Fill in directory attributes, batched. Missing profiles keep their
    /// placeholder fields; a ranking never fails on directory gaps.
    fn enrich(&self, entries: &mut [LeaderboardEntry]) {
        let ids: Vec<Uuid> = entries.iter().map(|e| e.user_id).collect();
        for chunk in ids.chunks(self.display_batch_size) {
            let infos = self.directory.display_info(chunk);
            for entry in entries.iter_mut() {
                if let Some(info) = infos.get(&entry.user_id) {
                    entry.apply_display(info);
                }
            }
        }
    }
}

/// Whether `candidate` is a strictly better representative attempt than
/// `current` for one user. Equal values go to the later attempt.
fn beats(candidate: &UserTestResult, current: &UserTestResult, direction: Direction) -> bool {
    let better = match direction {
        Direction::Increasing => candidate.value > current.value,
        Direction::Decreasing => candidate.value < current.value,
    };
    better || (candidate.value == current.value && candidate.executed_at > current.executed_at)
}

/// Leaderboard errors.
#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("Window start must precede its end")]
    InvalidWindow,

    #[error("Page and page size are 1-based and must be positive")]
    InvalidPage,

    #[error("Test {0} not found")]
    TestNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl LeaderboardError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            LeaderboardError::InvalidWindow => "BOARD_INVALID_WINDOW",
            LeaderboardError::InvalidPage => "BOARD_INVALID_PAGE",
            LeaderboardError::TestNotFound(_) => "BOARD_TEST_NOT_FOUND",
            LeaderboardError::Database(e) => e.code(),
        }
    }
}
