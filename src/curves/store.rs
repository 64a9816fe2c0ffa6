//! Reference curve persistence.
//!
//! T011: Curve store trait + SQLite-backed implementation

use crate::curves::types::{CurveError, Gender, ReferenceCurve};
use crate::storage::database::Database;
use std::sync::Arc;

/// Lookup-table source abstracted behind a trait so tests and other
/// backends can substitute their own.
pub trait CurveStore {
    /// Fetch the curve for a test and gender.
    fn get_curve(&self, test_name: &str, gender: Gender) -> Result<ReferenceCurve, CurveError>;
}

/// Curve store backed by the engine database.
pub struct SqliteCurveStore {
    db: Arc<Database>,
}

impl SqliteCurveStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace the curve for `(test_name, gender)`.
    pub fn put_curve(&self, curve: &ReferenceCurve) -> Result<(), CurveError> {
        self.db
            .upsert_curve(curve)
            .map_err(|e| CurveError::Database(e.to_string()))
    }
}

impl CurveStore for SqliteCurveStore {
    fn get_curve(&self, test_name: &str, gender: Gender) -> Result<ReferenceCurve, CurveError> {
        match self.db.get_curve(test_name, gender) {
            Ok(Some(curve)) => Ok(curve),
            Ok(None) => Err(CurveError::NotFound {
                test_name: test_name.to_string(),
                gender,
            }),
            Err(e) => Err(CurveError::Database(e.to_string())),
        }
    }
}
