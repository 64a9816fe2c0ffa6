//! Read-through cache for reference curves.
//!
//! T012: Curve cache keyed by (test name, gender)
//!
//! Populated lazily on first lookup; a curve replacement evicts the test's
//! entries via [`CurveCache::invalidate`]. The cache is injected into the
//! scoring path rather than held as a process-wide singleton so tests can
//! substitute their own.

use crate::curves::store::CurveStore;
use crate::curves::types::{CurveError, Gender, ReferenceCurve};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct CurveCache {
    store: Arc<dyn CurveStore>,
    curves: Mutex<HashMap<(String, Gender), Arc<ReferenceCurve>>>,
}

impl CurveCache {
    pub fn new(store: Arc<dyn CurveStore>) -> Self {
        Self {
            store,
            curves: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a curve, hitting the store only on a miss.
    pub fn get(&self, test_name: &str, gender: Gender) -> Result<Arc<ReferenceCurve>, CurveError> {
        let key = (test_name.to_string(), gender);

        if let Some(curve) = self.curves.lock().expect("curve cache poisoned").get(&key) {
            return Ok(Arc::clone(curve));
        }

        let curve = Arc::new(self.store.get_curve(test_name, gender)?);
        tracing::debug!(test_name, %gender, "reference curve cached");

        self.curves
            .lock()
            .expect("curve cache poisoned")
            .insert(key, Arc::clone(&curve));

        Ok(curve)
    }

    /// Drop all cached entries for a test, both genders.
    pub fn invalidate(&self, test_name: &str) {
        self.curves
            .lock()
            .expect("curve cache poisoned")
            .retain(|(name, _), _| name != test_name);
    }

    /// Number of cached curves (diagnostics and tests).
    pub fn len(&self) -> usize {
        self.curves.lock().expect("curve cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
