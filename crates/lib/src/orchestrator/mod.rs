//! Build orchestration.
//!
//! The orchestrator resolves each requested target's build order, creates one
//! [`Artifact`] per target name for the whole run, and walks each order
//! dependency-first deciding whether to load or build every artifact.
//!
//! Within one build order, once an artifact has been built every artifact
//! after it is rebuilt without a load attempt: its build args embed the tag of
//! the artifact just built, so it is almost certainly new as well.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::config::{Config, Options};
use crate::digest::DigestEngine;
use crate::engine::ContainerEngine;
use crate::error::{Error, Result};
use crate::graph;

pub struct Orchestrator<'a, E: ContainerEngine> {
  config: &'a Config,
  engine: E,
  digests: DigestEngine<'a>,
  artifacts: BTreeMap<String, Artifact>,
  chains: BTreeMap<String, Vec<String>>,
}

impl<'a, E: ContainerEngine> Orchestrator<'a, E> {
  /// Create an orchestrator publishing to `repo`. `tags` maps targets to
  /// explicit tags.
  pub fn new(config: &'a Config, engine: E, repo: &str, tags: BTreeMap<String, String>) -> Result<Self> {
    Ok(Orchestrator {
      config,
      engine,
      digests: DigestEngine::new(config, repo, tags)?,
      artifacts: BTreeMap::new(),
      chains: BTreeMap::new(),
    })
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn artifact(&self, target: &str) -> Option<&Artifact> {
    self.artifacts.get(target)
  }

  /// Dependency-first build order of `target`, creating missing artifacts.
  pub fn build_order(&mut self, target: &str) -> Result<Vec<String>> {
    if let Some(chain) = self.chains.get(target) {
      return Ok(chain.clone());
    }

    let chain = graph::resolve(self.config, target)?;
    for name in &chain {
      self.materialize(name)?;
    }
    self.chains.insert(target.to_string(), chain.clone());
    Ok(chain)
  }

  fn materialize(&mut self, target: &str) -> Result<()> {
    if self.artifacts.contains_key(target) {
      return Ok(());
    }

    let artifact = self.digests.artifact(target)?;
    {
      let _span = artifact.span().entered();
      info!("target_image {}", artifact.name());
    }
    self.artifacts.insert(target.to_string(), artifact);
    Ok(())
  }

  /// Resolve every requested target, then load or build each build order.
  pub fn build(&mut self, targets: &[String], force: bool) -> Result<()> {
    info!("Resolving build targets");
    for target in targets {
      self.build_order(target)?;
    }

    for target in targets {
      let chain = self.build_order(target)?;
      announce(target, &chain);
      self.build_target_images(target, force)?;
    }

    Ok(())
  }

  /// Walk one build order, loading artifacts until the first build and
  /// building everything after it.
  pub fn build_target_images(&mut self, target: &str, force: bool) -> Result<()> {
    let chain = self.build_order(target)?;
    let options = &self.config.options;
    let mut cache_invalidated = false;

    for name in &chain {
      let artifact = self
        .artifacts
        .get_mut(name)
        .ok_or_else(|| Error::TargetNotFound(name.clone()))?;
      let _span = artifact.span().entered();

      if force || cache_invalidated {
        build_artifact(options, &self.engine, artifact)?;
        cache_invalidated = true;
        continue;
      }

      if !load_artifact(options, &self.engine, artifact)? {
        build_artifact(options, &self.engine, artifact)?;
        cache_invalidated = true;
      }
    }

    Ok(())
  }

  /// Push the artifacts of `targets`, skipping those pulled and not rebuilt.
  pub fn push(&mut self, targets: &[String]) -> Result<()> {
    info!("Pushing images");

    for target in targets {
      self.materialize(target)?;
      let artifact = self
        .artifacts
        .get(target)
        .ok_or_else(|| Error::TargetNotFound(target.clone()))?;
      let _span = artifact.span().entered();
      let name = artifact.name();

      if artifact.was_pulled() && !artifact.was_built() {
        info!("{} Skipping push of pulled image", name);
        continue;
      }

      info!("{} Trying push...", name);
      artifact.push(&self.engine)?;
    }

    Ok(())
  }
}

fn announce(target: &str, chain: &[String]) {
  let dependencies: Vec<String> = chain.iter().rev().skip(1).map(|t| format!("[{}]", t)).collect();
  if dependencies.is_empty() {
    info!("Building [{}] target", target);
  } else {
    info!("Building [{}] target with dependencies: {}", target, dependencies.join(", "));
  }
}

/// Try to make `artifact` present without building it.
///
/// A validation failure tolerated by `build_on_validate_error` demotes the
/// artifact so that it is rebuilt.
fn load_artifact<E: ContainerEngine>(options: &Options, engine: &E, artifact: &mut Artifact) -> Result<bool> {
  match try_load(options, engine, artifact) {
    Err(e @ Error::ImageValidation(_)) if options.build_on_validate_error => {
      let name = artifact.name();
      warn!("{} ImageValidationError: {}", name, e);
      warn!("{} build_on_validate_error enabled, continuing...", name);
      artifact.invalidate();
      Ok(false)
    }
    other => other,
  }
}

fn try_load<E: ContainerEngine>(options: &Options, engine: &E, artifact: &mut Artifact) -> Result<bool> {
  let name = artifact.name();

  if artifact.is_present(engine)? {
    info!("{} Image loaded", name);
  } else {
    info!("{} Image not loaded", name);
    pull_artifact(options, engine, artifact)?;
  }

  if artifact.is_present(engine)? && options.validate_image {
    artifact.validate(engine)?;
    info!("{} Image validated", name);
  }

  artifact.is_present(engine)
}

fn pull_artifact<E: ContainerEngine>(options: &Options, engine: &E, artifact: &mut Artifact) -> Result<()> {
  let name = artifact.name();
  info!("{} Trying pull...", name);

  match artifact.pull(engine) {
    Ok(()) => Ok(()),
    Err(e) => match e.kind() {
      Some(kind) if options.allows_pull_error(kind) => {
        info!("{} {}: {}", name, kind, e);
        info!("{} {} in allowed_pull_errors, continuing...", name, kind);
        Ok(())
      }
      _ => Err(e),
    },
  }
}

fn build_artifact<E: ContainerEngine>(options: &Options, engine: &E, artifact: &mut Artifact) -> Result<()> {
  let name = artifact.name();
  info!("{} Trying build...", name);

  let json = artifact.build_options().to_pretty_json();
  let mut lines = json.lines();
  if let Some(first) = lines.next() {
    info!("{} build_options {}", name, first);
  }
  for line in lines {
    info!("{}", line);
  }

  artifact.build(engine)?;
  if options.prune_after_build {
    artifact.prune(engine);
  }
  Ok(())
}
