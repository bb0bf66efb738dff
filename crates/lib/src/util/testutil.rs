//! Test utilities for prefab-lib.
//!
//! [`RecordingEngine`] is an in-memory container engine that records every
//! call made against it, with knobs to make individual operations fail.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::digest::BuildOptions;
use crate::engine::{BuildEntry, BuildStream, ContainerEngine, EngineError, TransferEntry, TransferStream};

pub type Labels = BTreeMap<String, String>;

/// A call made against a [`RecordingEngine`], with the artifact name or repo it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  List(String),
  Pull(String),
  Build(String),
  Push(String),
  Labels(String),
  Remove(String),
  Prune,
}

/// How a pull should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullFailure {
  /// The registry reports the artifact as unknown.
  NotFound,
  /// The registry rejects the request.
  Denied,
  /// The transfer starts and then reports an error entry.
  Stream,
}

#[derive(Default)]
pub struct RecordingEngine {
  local: RefCell<BTreeMap<String, Labels>>,
  remote: RefCell<BTreeMap<String, Labels>>,
  pull_failures: RefCell<HashMap<String, PullFailure>>,
  build_failures: RefCell<HashSet<String>>,
  build_message_failures: RefCell<HashSet<String>>,
  push_failures: RefCell<HashSet<String>>,
  list_fails: Cell<bool>,
  prune_fails: Cell<bool>,
  calls: RefCell<Vec<Call>>,
}

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

impl RecordingEngine {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make `name` available locally with the given labels.
  pub fn add_local(&self, name: &str, labels: Labels) {
    self.local.borrow_mut().insert(name.to_string(), labels);
  }

  /// Make `name` pullable from the registry with the given labels.
  pub fn add_remote(&self, name: &str, labels: Labels) {
    self.remote.borrow_mut().insert(name.to_string(), labels);
  }

  pub fn fail_pull(&self, name: &str, failure: PullFailure) {
    self.pull_failures.borrow_mut().insert(name.to_string(), failure);
  }

  pub fn fail_build(&self, name: &str) {
    self.build_failures.borrow_mut().insert(name.to_string());
  }

  /// Fail the build of `name` with an entry carrying only a `message`.
  pub fn fail_build_message(&self, name: &str) {
    self.build_message_failures.borrow_mut().insert(name.to_string());
  }

  pub fn fail_push(&self, name: &str) {
    self.push_failures.borrow_mut().insert(name.to_string());
  }

  pub fn fail_list(&self) {
    self.list_fails.set(true);
  }

  pub fn fail_prune(&self) {
    self.prune_fails.set(true);
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.borrow().clone()
  }

  pub fn pulled(&self) -> Vec<String> {
    self.names_of(|c| matches!(c, Call::Pull(_)))
  }

  pub fn built(&self) -> Vec<String> {
    self.names_of(|c| matches!(c, Call::Build(_)))
  }

  pub fn pushed(&self) -> Vec<String> {
    self.names_of(|c| matches!(c, Call::Push(_)))
  }

  pub fn is_local(&self, name: &str) -> bool {
    self.local.borrow().contains_key(name)
  }

  fn names_of(&self, pred: impl Fn(&Call) -> bool) -> Vec<String> {
    self
      .calls
      .borrow()
      .iter()
      .filter(|c| pred(c))
      .filter_map(|c| match c {
        Call::Pull(n) | Call::Build(n) | Call::Push(n) => Some(n.clone()),
        _ => None,
      })
      .collect()
  }

  fn record(&self, call: Call) {
    self.calls.borrow_mut().push(call);
  }
}

fn transfer(entries: Vec<TransferEntry>) -> TransferStream {
  Box::new(entries.into_iter().map(Ok))
}

fn layer(id: &str, status: &str) -> TransferEntry {
  TransferEntry {
    id: Some(id.to_string()),
    ..TransferEntry::status(status)
  }
}

impl ContainerEngine for RecordingEngine {
  fn list_artifacts(&self, repo: &str) -> Result<BTreeSet<String>, EngineError> {
    self.record(Call::List(repo.to_string()));
    if self.list_fails.get() {
      return Err(EngineError::Api("Cannot connect to the Docker daemon".to_string()));
    }
    let prefix = format!("{}:", repo);
    Ok(self.local.borrow().keys().filter(|n| n.starts_with(&prefix)).cloned().collect())
  }

  fn pull(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    let name = format!("{}:{}", repo, tag);
    self.record(Call::Pull(name.clone()));

    match self.pull_failures.borrow().get(&name) {
      Some(PullFailure::NotFound) => return Err(EngineError::NotFound(format!("manifest for {} not found", name))),
      Some(PullFailure::Denied) => return Err(EngineError::Api(format!("pull access denied for {}", repo))),
      Some(PullFailure::Stream) => {
        return Ok(transfer(vec![
          layer("a1b2", "Pulling fs layer"),
          TransferEntry::error("unexpected EOF"),
        ]));
      }
      None => {}
    }

    let Some(labels) = self.remote.borrow().get(&name).cloned() else {
      return Err(EngineError::NotFound(format!("manifest for {} not found", name)));
    };
    self.local.borrow_mut().insert(name.clone(), labels);

    Ok(transfer(vec![
      TransferEntry::status(format!("{}: Pulling from {}", tag, repo)),
      layer("a1b2", "Pulling fs layer"),
      TransferEntry {
        progress: Some("[=====>    ] 5MB/10MB".to_string()),
        ..layer("a1b2", "Downloading")
      },
      layer("a1b2", "Pull complete"),
      TransferEntry::status(format!("Status: Downloaded newer image for {}", name)),
    ]))
  }

  fn build(&self, options: &BuildOptions) -> Result<BuildStream, EngineError> {
    self.record(Call::Build(options.tag.clone()));

    let mut entries = vec![BuildEntry::stream(format!("Step 1/2 : FROM {}\n", options.dockerfile))];
    if self.build_failures.borrow().contains(&options.tag) {
      entries.push(BuildEntry::error("The command '/bin/sh -c make' returned a non-zero code: 2"));
    } else if self.build_message_failures.borrow().contains(&options.tag) {
      entries.push(BuildEntry {
        message: Some("failed to solve: process did not complete successfully".to_string()),
        ..Default::default()
      });
    } else {
      self.local.borrow_mut().insert(options.tag.clone(), options.labels.clone());
      entries.push(BuildEntry::stream("\n"));
      entries.push(BuildEntry::stream(format!("Successfully tagged {}\n", options.tag)));
    }
    Ok(Box::new(entries.into_iter().map(Ok)))
  }

  fn push(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    let name = format!("{}:{}", repo, tag);
    self.record(Call::Push(name.clone()));

    if self.push_failures.borrow().contains(&name) {
      return Ok(transfer(vec![
        layer("c3d4", "Preparing"),
        TransferEntry::error("denied: requested access to the resource is denied"),
      ]));
    }
    let Some(labels) = self.local.borrow().get(&name).cloned() else {
      return Err(EngineError::NotFound(format!("tag does not exist: {}", name)));
    };
    self.remote.borrow_mut().insert(name.clone(), labels);

    Ok(transfer(vec![
      TransferEntry::status(format!("The push refers to repository [{}]", repo)),
      layer("c3d4", "Pushed"),
    ]))
  }

  fn get_labels(&self, name: &str) -> Result<Labels, EngineError> {
    self.record(Call::Labels(name.to_string()));
    self
      .local
      .borrow()
      .get(name)
      .cloned()
      .ok_or_else(|| EngineError::NotFound(format!("No such image: {}", name)))
  }

  fn remove(&self, name: &str) -> Result<(), EngineError> {
    self.record(Call::Remove(name.to_string()));
    self
      .local
      .borrow_mut()
      .remove(name)
      .map(|_| ())
      .ok_or_else(|| EngineError::NotFound(format!("No such image: {}", name)))
  }

  fn prune_dangling(&self) -> Result<(), EngineError> {
    self.record(Call::Prune);
    if self.prune_fails.get() {
      return Err(EngineError::Api("a prune operation is already running".to_string()));
    }
    Ok(())
  }
}
