//! Per-target artifact lifecycle.
//!
//! An [`Artifact`] is the container image a target produces. Its presence
//! starts out unknown and is resolved lazily against the engine:
//!
//! ```text
//! Unresolved ──list──> Present
//!     │
//!     └──────list──> Absent ──pull──> Present (pulled)
//!                       │
//!                       └────build──> Present (built)
//! ```
//!
//! A present artifact only goes back to needing a build through
//! [`Artifact::invalidate`], after its labels failed validation.

use std::collections::BTreeMap;

use tracing::{Span, info, info_span, warn};

use crate::digest::BuildOptions;
use crate::engine::{ContainerEngine, EngineError, TransferStream};
use crate::error::{Error, Result};

/// Whether an artifact is available in the local engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
  Unresolved,
  Present,
  Absent,
}

#[derive(Debug, Clone)]
pub struct Artifact {
  target: String,
  repo: String,
  tag: String,
  build_options: BuildOptions,
  presence: Presence,
  was_pulled: bool,
  was_built: bool,
}

/// Map a failure to query or pull an artifact.
fn access_error(e: EngineError) -> Error {
  match e {
    EngineError::NotFound(message) => Error::ImageNotFound(message),
    EngineError::Api(message) => Error::ImageAccess(message),
    other => Error::Engine(other),
  }
}

fn push_error(e: EngineError) -> Error {
  match e {
    EngineError::NotFound(message) | EngineError::Api(message) => Error::ImagePush(message),
    other => Error::Engine(other),
  }
}

fn build_error(e: EngineError) -> Error {
  match e {
    EngineError::NotFound(message) | EngineError::Api(message) => Error::ImageBuild(message),
    other => Error::Engine(other),
  }
}

/// Log a pull or push stream, failing on the first error entry.
fn consume_transfer(
  stream: TransferStream,
  on_error_entry: fn(String) -> Error,
  on_engine_error: fn(EngineError) -> Error,
) -> Result<()> {
  for entry in stream {
    let entry = entry.map_err(on_engine_error)?;

    if let Some(error) = entry.error
      && !error.is_empty()
    {
      return Err(on_error_entry(error));
    }

    if entry.progress.is_some() {
      continue;
    }
    let Some(status) = entry.status else {
      continue;
    };

    match entry.id {
      Some(id) => info!("{}: {}", id, status),
      None => info!("{}", status),
    }
  }

  Ok(())
}

impl Artifact {
  pub fn new(target: &str, repo: impl Into<String>, tag: impl Into<String>, build_options: BuildOptions) -> Self {
    Artifact {
      target: target.to_string(),
      repo: repo.into(),
      tag: tag.into(),
      build_options,
      presence: Presence::Unresolved,
      was_pulled: false,
      was_built: false,
    }
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn repo(&self) -> &str {
    &self.repo
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// Full `repo:tag` name.
  pub fn name(&self) -> String {
    format!("{}:{}", self.repo, self.tag)
  }

  pub fn build_options(&self) -> &BuildOptions {
    &self.build_options
  }

  pub fn presence(&self) -> Presence {
    self.presence
  }

  pub fn was_pulled(&self) -> bool {
    self.was_pulled
  }

  pub fn was_built(&self) -> bool {
    self.was_built
  }

  /// Span carrying the target id for every log line about this artifact.
  pub fn span(&self) -> Span {
    info_span!("target", id = %self.target)
  }

  /// Whether the artifact exists locally, querying the engine on first use.
  pub fn is_present<E: ContainerEngine + ?Sized>(&mut self, engine: &E) -> Result<bool> {
    if self.presence == Presence::Unresolved {
      let names = engine.list_artifacts(&self.repo).map_err(|e| match e {
        EngineError::NotFound(message) | EngineError::Api(message) => Error::ImageAccess(message),
        other => Error::Engine(other),
      })?;
      if names.contains(&self.name()) {
        self.mark_present();
      } else {
        self.mark_absent();
      }
    }
    Ok(self.presence == Presence::Present)
  }

  fn mark_present(&mut self) {
    self.presence = Presence::Present;
  }

  fn mark_absent(&mut self) {
    self.presence = Presence::Absent;
  }

  fn mark_pulled(&mut self) {
    self.presence = Presence::Present;
    self.was_pulled = true;
  }

  fn mark_built(&mut self) {
    self.presence = Presence::Present;
    self.was_built = true;
  }

  /// Demote a present artifact whose validation failed so that it gets rebuilt.
  pub fn invalidate(&mut self) {
    self.mark_absent();
  }

  pub fn pull<E: ContainerEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
    let stream = engine.pull(&self.repo, &self.tag).map_err(access_error)?;
    consume_transfer(stream, Error::ImageAccess, access_error)?;
    self.mark_pulled();
    Ok(())
  }

  /// Check that the engine-reported labels match the expected build labels.
  pub fn validate<E: ContainerEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
    let name = self.name();
    if !self.is_present(engine)? {
      return Err(Error::ImageNotFound(format!("{} not found", name)));
    }

    let actual: BTreeMap<String, String> = engine.get_labels(&name).map_err(access_error)?;
    for (label, expected) in &self.build_options.labels {
      let found = actual.get(label);
      if found != Some(expected) {
        return Err(Error::ImageValidation(format!(
          "{} label \"{}\" expected value \"{}\", got \"{}\"",
          name,
          label,
          expected,
          found.map(String::as_str).unwrap_or("<none>")
        )));
      }
    }

    Ok(())
  }

  pub fn build<E: ContainerEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
    let stream = engine.build(&self.build_options).map_err(build_error)?;

    for entry in stream {
      let entry = entry.map_err(build_error)?;
      if let Some(error) = entry.error.or(entry.message) {
        return Err(Error::ImageBuild(error));
      }
      if let Some(message) = entry.stream.as_deref().map(str::trim)
        && !message.is_empty()
      {
        info!("{}", message);
      }
    }

    self.mark_built();
    info!("{} Build succeeded", self.name());
    Ok(())
  }

  /// Best-effort removal of dangling artifacts; failures are only logged.
  pub fn prune<E: ContainerEngine + ?Sized>(&self, engine: &E) {
    match engine.prune_dangling() {
      Ok(()) => info!("Pruned dangling images"),
      Err(e) => warn!("Prune dangling images failed: {}", e),
    }
  }

  pub fn push<E: ContainerEngine + ?Sized>(&self, engine: &E) -> Result<()> {
    let stream = engine.push(&self.repo, &self.tag).map_err(push_error)?;
    consume_transfer(stream, Error::ImagePush, push_error)
  }

  /// Remove the artifact from the local engine.
  pub fn remove<E: ContainerEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
    engine.remove(&self.name()).map_err(access_error)?;
    self.mark_absent();
    Ok(())
  }
}
