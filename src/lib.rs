//! AthleTest - Test Measurement, Verification and Leaderboard Engine
//!
//! Library core for the sports-platform test subsystem: test catalog with
//! gender-specific reference curves, raw-measurement normalization to 0-100
//! points, skill-tier classification, a two-party verification workflow,
//! direction-aware leaderboards and time-bucketed trend charts.

pub mod catalog;
pub mod collaborators;
pub mod curves;
pub mod leaderboard;
pub mod results;
pub mod scoring;
pub mod snapshot;
pub mod storage;
pub mod trends;

// Re-export commonly used types
pub use catalog::service::CatalogService;
pub use curves::cache::CurveCache;
pub use leaderboard::aggregator::LeaderboardService;
pub use results::workflow::ResultService;
pub use scoring::classifier::Level;
pub use snapshot::service::SnapshotService;
pub use storage::database::Database;
pub use trends::chart::ChartService;
