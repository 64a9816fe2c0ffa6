//! User test result types.
//!
//! T018: Define UserTestResult and submission types

use crate::curves::types::Gender;
use crate::scoring::classifier::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who recorded the measurement.
///
/// Coach submissions skip the verification workflow entirely: the coach is
/// stored as the controller and the result starts out verified and
/// confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Self-reported by the athlete; an optional second party verifies it.
    Athlete { controller_id: Option<Uuid> },
    /// Recorded on the athlete's behalf by a coach.
    Coach { coach_id: Uuid },
}

/// Verification decision taken by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationDecision {
    Verified,
    Rejected,
}

/// Why a result could not be shared to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareReason {
    NotOwner,
    Private,
    Unverified,
}

impl std::fmt::Display for ShareReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareReason::NotOwner => write!(f, "requester does not own the result"),
            ShareReason::Private => write!(f, "result is not public"),
            ShareReason::Unverified => write!(f, "result is not verified"),
        }
    }
}

/// A single recorded measurement with its derived score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTestResult {
    pub id: Uuid,
    pub subtype_id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    /// Second party designated to verify the result, if any.
    pub controller_id: Option<Uuid>,
    /// Raw measured value in the test's unit.
    pub value: f64,
    pub metric: String,
    /// Normalized 0-100 score.
    pub point: f64,
    pub level: Level,
    pub executed_at: DateTime<Utc>,
    pub is_public: bool,
    pub is_verified: bool,
    /// Verification lock: once set, no further decision is accepted.
    pub is_confirmed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A measurement submission before scoring.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub subtype_id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub origin: Origin,
    pub value: f64,
    /// Athlete body weight in kg, for weight-relative tests.
    pub body_weight: Option<f64>,
    /// Gender used to select the reference curve.
    pub gender: Gender,
    pub executed_at: DateTime<Utc>,
    pub is_public: bool,
}
