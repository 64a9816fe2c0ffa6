//! Unit tests for the table-parse, normalize, classify pipeline.

use athletest::curves::types::{CurveTable, Gender, ReferenceCurve};
use athletest::scoring::{classify, normalize, Level};

fn table(marker: &str, unit: &str, values: &[&str], points: &[f64]) -> CurveTable {
    let mut rows = vec![
        Some("Test".to_string()),
        Some(unit.to_string()),
        Some(marker.to_string()),
    ];
    rows.extend(values.iter().map(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    }));
    CurveTable {
        gender: Gender::Male,
        rows,
        index_column: points.to_vec(),
    }
}

#[test]
fn test_sprint_scoring_scenario() {
    // Lower-is-better sprint: 5.2s beats the 5.5s reference but not 5.0s.
    let curve = ReferenceCurve::from_table(
        "40m Sprint",
        &table(">", "sec", &["5.0", "5.5", "6.0"], &[90.0, 70.0, 40.0]),
    )
    .unwrap();

    assert_eq!(normalize(&curve, 5.2, None).unwrap(), 70.0);
    assert_eq!(normalize(&curve, 5.0, None).unwrap(), 90.0);
    // Faster than the best reference clamps to the top point.
    assert_eq!(normalize(&curve, 4.2, None).unwrap(), 90.0);
    // Slower than the worst reference clamps to the bottom point.
    assert_eq!(normalize(&curve, 9.0, None).unwrap(), 40.0);
}

#[test]
fn test_increasing_curve_scoring() {
    let curve = ReferenceCurve::from_table(
        "Standing Jump",
        &table("<", "cm", &["60", "50", "40"], &[90.0, 70.0, 40.0]),
    )
    .unwrap();

    assert_eq!(normalize(&curve, 55.0, None).unwrap(), 70.0);
    assert_eq!(normalize(&curve, 75.0, None).unwrap(), 90.0);
    assert_eq!(normalize(&curve, 10.0, None).unwrap(), 40.0);
}

#[test]
fn test_weight_relative_scoring_divides_by_body_weight() {
    let curve = ReferenceCurve::from_table(
        "Back Squat",
        &table("<", "kg/bodyweight", &["2.0", "1.5", "1.0"], &[90.0, 70.0, 40.0]),
    )
    .unwrap();
    assert!(curve.is_weight_relative());

    // 120 kg at 80 kg body weight is a 1.5x squat.
    assert_eq!(normalize(&curve, 120.0, Some(80.0)).unwrap(), 70.0);
    // Missing body weight falls back to the raw value as-is.
    assert_eq!(normalize(&curve, 1.5, None).unwrap(), 70.0);
}

#[test]
fn test_sparse_positions_are_skipped() {
    let curve = ReferenceCurve::from_table(
        "40m Sprint",
        &table(">", "sec", &["5.0", "", "6.0"], &[90.0, 70.0, 40.0]),
    )
    .unwrap();

    // The 70-point position is blank, so 5.2s falls through to 40.
    assert_eq!(normalize(&curve, 5.2, None).unwrap(), 40.0);
}

#[test]
fn test_tier_boundaries() {
    assert_eq!(classify(0.0), Level::Amateur);
    assert_eq!(classify(39.9), Level::Amateur);
    assert_eq!(classify(40.0), Level::SemiPro);
    assert_eq!(classify(69.9), Level::SemiPro);
    assert_eq!(classify(70.0), Level::Pro);
    assert_eq!(classify(89.9), Level::Pro);
    assert_eq!(classify(90.0), Level::International);
    assert_eq!(classify(100.0), Level::International);
}

#[test]
fn test_out_of_range_points_fall_back_to_amateur() {
    assert_eq!(classify(-3.0), Level::Amateur);
    assert_eq!(classify(100.5), Level::Amateur);
    assert_eq!(classify(f64::NAN), Level::Amateur);
}
