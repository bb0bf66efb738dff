//! prefab-lib: Core types and logic for prefab
//!
//! This crate provides the building blocks of an incremental container image
//! build:
//! - `Config`: validated target definitions and run options
//! - `graph`: dependency-first build orders with cycle detection
//! - `DigestEngine`: content digests, tags, labels and build options per target
//! - `Artifact`: the lifecycle of one target's image against a `ContainerEngine`
//! - `Orchestrator`: load-or-build decisions across build orders, and pushing

pub mod artifact;
pub mod config;
pub mod consts;
pub mod digest;
pub mod engine;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod util;

pub use artifact::{Artifact, Presence};
pub use config::Config;
pub use digest::{BuildOptions, DigestEngine};
pub use engine::{ContainerEngine, DockerCli, FakeEngine};
pub use error::{Error, ErrorKind, Result};
pub use orchestrator::Orchestrator;
