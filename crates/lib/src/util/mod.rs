//! Shared utilities.
//!
//! Content hashing, watched-path expansion and test helpers.

pub mod hash;
pub mod walk;

#[cfg(test)]
pub mod testutil;
