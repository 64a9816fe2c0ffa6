//! Reference curve model and table parsing.
//!
//! T010: Parse raw lookup tables into validated reference curves
//!
//! A raw table is the row sequence `[name, unit, marker, v0..v100]`; the
//! positions `v0..v100` line up 1:1 with the shared index column
//! `[p0..p100]` that gives the point awarded at each position. Positions are
//! ordered best first, so the index column is strictly descending. A `>`
//! marker means lower raw values are better.

use crate::catalog::types::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of leading metadata rows (name, unit, marker) in a raw table.
pub const TABLE_HEADER_ROWS: usize = 3;

/// Gender key for curve lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unparsed lookup table as delivered by the curve editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveTable {
    pub gender: Gender,
    /// `[name, unit, marker, v0..v100]`; sparse positions are `None`.
    pub rows: Vec<Option<String>>,
    /// Point awarded at each value position, best first.
    pub index_column: Vec<f64>,
}

/// A validated, immutable-per-version lookup curve for one test and gender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCurve {
    pub test_name: String,
    pub gender: Gender,
    pub unit: String,
    pub direction: Direction,
    /// Reference values, best first; `None` positions are skipped on lookup.
    pub values: Vec<Option<f64>>,
    /// Point per position, parallel to `values`, strictly descending.
    pub points: Vec<f64>,
}

impl ReferenceCurve {
    /// Parse and validate a raw table.
    pub fn from_table(test_name: &str, table: &CurveTable) -> Result<Self, CurveError> {
        if table.rows.len() < TABLE_HEADER_ROWS {
            return Err(CurveError::Malformed(format!(
                "table for '{}' has {} rows, expected at least {}",
                test_name,
                table.rows.len(),
                TABLE_HEADER_ROWS
            )));
        }

        let header = |idx: usize, what: &str| -> Result<String, CurveError> {
            table.rows[idx]
                .clone()
                .ok_or_else(|| CurveError::Malformed(format!("missing {} row", what)))
        };

        let name = header(0, "name")?;
        let unit = header(1, "unit")?;
        let marker = header(2, "direction marker")?;

        let direction = if marker.trim() == ">" {
            Direction::Decreasing
        } else {
            Direction::Increasing
        };

        let value_rows = &table.rows[TABLE_HEADER_ROWS..];
        if value_rows.len() != table.index_column.len() {
            return Err(CurveError::Malformed(format!(
                "table for '{}' has {} value positions but index column has {}",
                name,
                value_rows.len(),
                table.index_column.len()
            )));
        }

        let mut values = Vec::with_capacity(value_rows.len());
        for row in value_rows {
            match row {
                Some(raw) => {
                    let parsed = raw.trim().parse::<f64>().map_err(|_| {
                        CurveError::Malformed(format!(
                            "non-numeric value '{}' in table for '{}'",
                            raw, name
                        ))
                    })?;
                    values.push(Some(parsed));
                }
                None => values.push(None),
            }
        }

        let curve = Self {
            test_name: test_name.to_string(),
            gender: table.gender,
            unit,
            direction,
            values,
            points: table.index_column.clone(),
        };
        curve.validate_monotonic()?;

        Ok(curve)
    }

    /// Whether raw measurements must be divided by body weight first.
    pub fn is_weight_relative(&self) -> bool {
        let unit = self.unit.to_lowercase();
        unit.contains("bodyweight") || unit.ends_with("/bw")
    }

    /// Tabulated `(value, point)` pairs, best first, skipping sparse slots.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values
            .iter()
            .zip(self.points.iter())
            .filter_map(|(v, p)| v.map(|v| (v, *p)))
    }

    /// Check the curve invariants: points strictly descending, values
    /// monotonic in the direction implied by the marker.
    fn validate_monotonic(&self) -> Result<(), CurveError> {
        let mut prev_point: Option<f64> = None;
        let mut prev_value: Option<f64> = None;

        for (value, point) in self.pairs() {
            if let Some(prev) = prev_point {
                if point >= prev {
                    return Err(CurveError::NotMonotonic(format!(
                        "index column not descending for '{}' ({} after {})",
                        self.test_name, point, prev
                    )));
                }
            }
            if let Some(prev) = prev_value {
                let ordered = match self.direction {
                    // Best first: values fall as positions get worse.
                    Direction::Increasing => value <= prev,
                    Direction::Decreasing => value >= prev,
                };
                if !ordered {
                    return Err(CurveError::NotMonotonic(format!(
                        "values not monotonic for '{}' ({} after {}, {})",
                        self.test_name, value, prev, self.direction
                    )));
                }
            }
            prev_point = Some(point);
            prev_value = Some(value);
        }

        Ok(())
    }
}

/// Reference curve errors.
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("Reference curve not found for test '{test_name}' ({gender})")]
    NotFound { test_name: String, gender: Gender },

    #[error("Reference curve has no tabulated values")]
    EmptyCurve,

    #[error("Reference curve is not monotonic: {0}")]
    NotMonotonic(String),

    #[error("Malformed curve table: {0}")]
    Malformed(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl CurveError {
    /// Stable machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            CurveError::NotFound { .. } => "CURVE_NOT_FOUND",
            CurveError::EmptyCurve => "CURVE_EMPTY",
            CurveError::NotMonotonic(_) => "CURVE_NOT_MONOTONIC",
            CurveError::Malformed(_) => "CURVE_MALFORMED",
            CurveError::Database(_) => "CURVE_STORAGE",
        }
    }
}
