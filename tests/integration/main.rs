//! Integration test modules.

mod verification_flow_test;
