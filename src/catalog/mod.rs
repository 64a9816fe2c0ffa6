//! Test catalog: categories, subtypes and test definitions.

pub mod service;
pub mod types;

pub use service::{CatalogError, CatalogService, NewTest};
pub use types::{Direction, Subtype, TestCategory, TestDefinition};
