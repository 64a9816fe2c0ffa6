//! Measurement scoring: curve normalization and skill-tier classification.

pub mod classifier;
pub mod normalizer;

pub use classifier::{classify, Level};
pub use normalizer::normalize;
