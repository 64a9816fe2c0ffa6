//! Reference curves: raw-value-to-point lookup tables per test and gender.

pub mod cache;
pub mod store;
pub mod types;

pub use cache::CurveCache;
pub use store::{CurveStore, SqliteCurveStore};
pub use types::{CurveError, CurveTable, Gender, ReferenceCurve};
