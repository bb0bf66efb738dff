//! Library integration tests against the public API.
