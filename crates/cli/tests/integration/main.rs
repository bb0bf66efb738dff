//! CLI integration tests, run against the dry-run engine.

mod build_tests;
mod common;
