//! Raw-measurement normalization against a reference curve.
//!
//! T014: Step-function curve lookup
//!
//! The lookup is a step function, not an interpolation: positions are
//! ordered best first, and the athlete receives the point of the first
//! position whose tabulated value is on the worse-or-equal side of the raw
//! measurement. Values better than the best tabulated position clamp to the
//! best point; values worse than the worst position fall through to the
//! worst point. No extrapolation in either direction.

use crate::catalog::types::Direction;
use crate::curves::types::{CurveError, ReferenceCurve};

/// Convert a raw measurement into a 0-100 point via table lookup.
///
/// Weight-relative curves (unit like "kg/bodyweight") divide the raw value
/// by the athlete's body weight first (1.0 when unknown), rounded to three
/// decimals to match how the tables were authored.
pub fn normalize(
    curve: &ReferenceCurve,
    raw_value: f64,
    body_weight: Option<f64>,
) -> Result<f64, CurveError> {
    let raw = if curve.is_weight_relative() {
        round3(raw_value / body_weight.unwrap_or(1.0))
    } else {
        raw_value
    };

    let mut last_point = None;

    for (value, point) in curve.pairs() {
        let worse_or_equal = match curve.direction {
            Direction::Increasing => value <= raw,
            Direction::Decreasing => value >= raw,
        };
        if worse_or_equal {
            return Ok(point);
        }
        last_point = Some(point);
    }

    // Raw is worse than every tabulated position: clamp to the worst point.
    last_point.ok_or(CurveError::EmptyCurve)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
