//! Skill tier classification from a normalized point.
//!
//! T015: Implement level bands

use serde::{Deserialize, Serialize};

/// Coarse skill tier derived from a 0-100 point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Amateur,
    SemiPro,
    Pro,
    International,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Amateur => "amateur",
            Level::SemiPro => "semi_pro",
            Level::Pro => "pro",
            Level::International => "international",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "amateur" => Some(Level::Amateur),
            "semi_pro" => Some(Level::SemiPro),
            "pro" => Some(Level::Pro),
            "international" => Some(Level::International),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a point to its tier. Total: out-of-range values fall back to Amateur.
pub fn classify(point: f64) -> Level {
    if (90.0..=100.0).contains(&point) {
        Level::International
    } else if (70.0..90.0).contains(&point) {
        Level::Pro
    } else if (40.0..70.0).contains(&point) {
        Level::SemiPro
    } else {
        Level::Amateur
    }
}
