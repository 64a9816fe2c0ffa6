//! User test results and the two-party verification workflow.

pub mod types;
pub mod workflow;

pub use types::{
    Origin, ShareReason, SubmitRequest, UserTestResult, VerificationDecision,
};
pub use workflow::{ResultError, ResultService};
