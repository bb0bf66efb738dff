//! Dry-run container engine.
//!
//! Nothing exists and nothing can be pulled. Builds and pushes succeed
//! without doing any work, so a dry run walks the full build order and logs
//! every decision.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use super::{BuildEntry, BuildStream, ContainerEngine, EngineError, TransferEntry, TransferStream};
use crate::digest::BuildOptions;

#[derive(Debug, Default)]
pub struct FakeEngine {
  /// Labels of every artifact "built" during this run, by name.
  built: RefCell<BTreeMap<String, BTreeMap<String, String>>>,
}

impl FakeEngine {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ContainerEngine for FakeEngine {
  fn list_artifacts(&self, repo: &str) -> Result<BTreeSet<String>, EngineError> {
    let prefix = format!("{}:", repo);
    Ok(self.built.borrow().keys().filter(|n| n.starts_with(&prefix)).cloned().collect())
  }

  fn pull(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    Err(EngineError::NotFound(format!("{}:{} Not found", repo, tag)))
  }

  fn build(&self, options: &BuildOptions) -> Result<BuildStream, EngineError> {
    self.built.borrow_mut().insert(options.tag.clone(), options.labels.clone());
    let entry = BuildEntry::stream(format!("{} Built (dry run)", options.tag));
    Ok(Box::new(std::iter::once(Ok(entry))))
  }

  fn push(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    let entry = TransferEntry::status(format!("{}:{} Pushed", repo, tag));
    Ok(Box::new(std::iter::once(Ok(entry))))
  }

  fn get_labels(&self, name: &str) -> Result<BTreeMap<String, String>, EngineError> {
    self
      .built
      .borrow()
      .get(name)
      .cloned()
      .ok_or_else(|| EngineError::NotFound(format!("{} Not found", name)))
  }

  fn remove(&self, name: &str) -> Result<(), EngineError> {
    self.built.borrow_mut().remove(name);
    Ok(())
  }

  fn prune_dangling(&self) -> Result<(), EngineError> {
    Ok(())
  }
}
