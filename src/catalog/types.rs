//! Test catalog types.
//!
//! T006: Define TestCategory, Direction, Subtype, TestDefinition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level test category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCategory {
    Physical,
    Technical,
    Tactical,
    Mental,
    Other,
}

impl TestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Physical => "physical",
            TestCategory::Technical => "technical",
            TestCategory::Tactical => "tactical",
            TestCategory::Mental => "mental",
            TestCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "physical" => Some(TestCategory::Physical),
            "technical" => Some(TestCategory::Technical),
            "tactical" => Some(TestCategory::Tactical),
            "mental" => Some(TestCategory::Mental),
            "other" => Some(TestCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which way "better" points for a test.
///
/// Derived once from the reference curve's direction marker when the test is
/// created; never edited independently of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Higher raw values are better (e.g. jump height).
    Increasing,
    /// Lower raw values are better (e.g. sprint time).
    Decreasing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Increasing => "increasing",
            Direction::Decreasing => "decreasing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "increasing" => Some(Direction::Increasing),
            "decreasing" => Some(Direction::Decreasing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named grouping of tests within a category (e.g. "Jumping" in Physical).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtype {
    pub id: Uuid,
    pub test_type: TestCategory,
    pub subtype_name: String,
    /// Active test definitions in this subtype.
    pub tests: Vec<TestDefinition>,
    /// Ids of soft-deleted tests, kept for audit.
    pub deleted_tests: Vec<Uuid>,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single measurable exercise with a unit, direction and reference curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub id: Uuid,
    pub subtype_id: Uuid,
    pub test_name: String,
    /// Measurement unit ("sec", "cm", "kg/bodyweight", ...).
    pub metric: String,
    pub direction: Direction,
    pub media: Option<String>,
    pub description: Option<String>,
    pub table_description: Option<String>,
    /// Ids of related test definitions.
    pub references: Vec<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for cat in [
            TestCategory::Physical,
            TestCategory::Technical,
            TestCategory::Tactical,
            TestCategory::Mental,
            TestCategory::Other,
        ] {
            assert_eq!(TestCategory::from_str(cat.as_str()), Some(cat));
        }
        assert_eq!(TestCategory::from_str("unknown"), None);
    }

    #[test]
    fn test_direction_round_trip() {
        assert_eq!(
            Direction::from_str("increasing"),
            Some(Direction::Increasing)
        );
        assert_eq!(
            Direction::from_str("DECREASING"),
            Some(Direction::Decreasing)
        );
        assert_eq!(Direction::from_str(">"), None);
    }
}
