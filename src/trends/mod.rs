//! Time-bucketed trend charts.

pub mod chart;

pub use chart::{ChartError, ChartService, NodeChart, NUMBER_OF_POINTS_IN_CHART};
