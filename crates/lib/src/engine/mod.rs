//! Container engine abstraction.
//!
//! The orchestrator talks to the engine only through [`ContainerEngine`].
//! Long-running operations (pull, build, push) return lazy iterators of
//! progress entries so callers can log them as they arrive.

mod docker;
mod fake;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::BuildOptions;

pub use docker::DockerCli;
pub use fake::FakeEngine;

/// Failure reported by a container engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The requested artifact or repository does not exist.
  #[error("{0}")]
  NotFound(String),

  /// Any other failure reported by the engine.
  #[error("{0}")]
  Api(String),

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

/// One progress entry of a pull or push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
  pub status: Option<String>,
  pub error: Option<String>,
  pub id: Option<String>,
  pub progress: Option<String>,
}

impl TransferEntry {
  pub fn status(status: impl Into<String>) -> Self {
    TransferEntry {
      status: Some(status.into()),
      ..Default::default()
    }
  }

  pub fn error(error: impl Into<String>) -> Self {
    TransferEntry {
      error: Some(error.into()),
      ..Default::default()
    }
  }
}

/// One output entry of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEntry {
  pub stream: Option<String>,
  pub error: Option<String>,
  pub message: Option<String>,
}

impl BuildEntry {
  pub fn stream(line: impl Into<String>) -> Self {
    BuildEntry {
      stream: Some(line.into()),
      ..Default::default()
    }
  }

  pub fn error(error: impl Into<String>) -> Self {
    BuildEntry {
      error: Some(error.into()),
      ..Default::default()
    }
  }
}

pub type TransferStream = Box<dyn Iterator<Item = Result<TransferEntry, EngineError>>>;
pub type BuildStream = Box<dyn Iterator<Item = Result<BuildEntry, EngineError>>>;

/// Operations the orchestrator needs from a container engine.
///
/// Artifacts are addressed by repository and tag, or by their full
/// `repo:tag` name.
pub trait ContainerEngine {
  /// Names (`repo:tag`) of the artifacts of `repo` available locally.
  fn list_artifacts(&self, repo: &str) -> Result<BTreeSet<String>, EngineError>;

  fn pull(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError>;

  fn build(&self, options: &BuildOptions) -> Result<BuildStream, EngineError>;

  fn push(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError>;

  /// Labels recorded on a local artifact.
  fn get_labels(&self, name: &str) -> Result<BTreeMap<String, String>, EngineError>;

  fn remove(&self, name: &str) -> Result<(), EngineError>;

  /// Remove dangling (untagged) artifacts.
  fn prune_dangling(&self) -> Result<(), EngineError>;
}
