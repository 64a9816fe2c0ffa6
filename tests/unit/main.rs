//! Unit test modules.

mod catalog_test;
mod leaderboard_test;
mod scoring_test;
