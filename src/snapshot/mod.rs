//! Per-category result snapshots (overwritten rollups).

pub mod service;
pub mod types;

pub use service::{SnapshotError, SnapshotService};
pub use types::{ResultSnapshot, SnapshotEntry};
