//! Error types for prefab-lib.
//!
//! Every failure the orchestrator may need to reason about carries an
//! [`ErrorKind`]. Kinds are what the tolerated-error policies match on
//! (`allowed_pull_errors`, `build_on_validate_error`); errors without a kind
//! are never tolerated and always abort the run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineError;
use crate::util::hash::HashError;

/// Closed set of classified failure kinds.
///
/// The serialized names are the ones accepted in `allowed_pull_errors` and
/// the ones printed in tolerated-error log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
  #[serde(rename = "HashAlgorithmNotFound")]
  HashAlgorithmNotFound,
  #[serde(rename = "ImageAccessError")]
  ImageAccess,
  #[serde(rename = "ImageBuildError")]
  ImageBuild,
  #[serde(rename = "ImageNotFoundError")]
  ImageNotFound,
  #[serde(rename = "ImagePushError")]
  ImagePush,
  #[serde(rename = "ImageValidationError")]
  ImageValidation,
  #[serde(rename = "InvalidConfigError")]
  InvalidConfig,
  #[serde(rename = "TargetCyclicError")]
  TargetCyclic,
  #[serde(rename = "TargetNotFoundError")]
  TargetNotFound,
}

impl ErrorKind {
  pub const ALL: [ErrorKind; 9] = [
    ErrorKind::HashAlgorithmNotFound,
    ErrorKind::ImageAccess,
    ErrorKind::ImageBuild,
    ErrorKind::ImageNotFound,
    ErrorKind::ImagePush,
    ErrorKind::ImageValidation,
    ErrorKind::InvalidConfig,
    ErrorKind::TargetCyclic,
    ErrorKind::TargetNotFound,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::HashAlgorithmNotFound => "HashAlgorithmNotFound",
      ErrorKind::ImageAccess => "ImageAccessError",
      ErrorKind::ImageBuild => "ImageBuildError",
      ErrorKind::ImageNotFound => "ImageNotFoundError",
      ErrorKind::ImagePush => "ImagePushError",
      ErrorKind::ImageValidation => "ImageValidationError",
      ErrorKind::InvalidConfig => "InvalidConfigError",
      ErrorKind::TargetCyclic => "TargetCyclicError",
      ErrorKind::TargetNotFound => "TargetNotFoundError",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ErrorKind {
  type Err = Error;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    ErrorKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| Error::InvalidConfig(format!("unknown error kind: {}", s)))
  }
}

/// Errors raised by the resolver, digest engine, artifact lifecycle and orchestrator.
///
/// Image errors render only their message so that tolerated-error log lines
/// read `<Kind>: <message>`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  ImageAccess(String),

  #[error("{0}")]
  ImageBuild(String),

  #[error("{0}")]
  ImageNotFound(String),

  #[error("{0}")]
  ImagePush(String),

  #[error("{0}")]
  ImageValidation(String),

  #[error("{0}")]
  InvalidConfig(String),

  #[error("Target [{0}] has circular dependencies")]
  TargetCyclic(String),

  #[error("Target [{0}] not found in build config")]
  TargetNotFound(String),

  #[error("failed to read config file {path}: {source}")]
  ReadConfig {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  /// Engine failure that could not be attributed to an operation kind,
  /// e.g. the engine binary could not be started.
  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl Error {
  /// The classified kind of this error, or `None` for unclassified failures.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Error::ImageAccess(_) => Some(ErrorKind::ImageAccess),
      Error::ImageBuild(_) => Some(ErrorKind::ImageBuild),
      Error::ImageNotFound(_) => Some(ErrorKind::ImageNotFound),
      Error::ImagePush(_) => Some(ErrorKind::ImagePush),
      Error::ImageValidation(_) => Some(ErrorKind::ImageValidation),
      Error::InvalidConfig(_) => Some(ErrorKind::InvalidConfig),
      Error::TargetCyclic(_) => Some(ErrorKind::TargetCyclic),
      Error::TargetNotFound(_) => Some(ErrorKind::TargetNotFound),
      Error::Hash(HashError::UnsupportedAlgorithm { .. }) => Some(ErrorKind::HashAlgorithmNotFound),
      Error::Hash(HashError::InvalidPattern { .. }) => Some(ErrorKind::InvalidConfig),
      Error::ReadConfig { .. } | Error::Hash(_) | Error::Engine(_) => None,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
