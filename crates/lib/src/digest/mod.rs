//! Content digests and derived build metadata.
//!
//! A target digest is a pure function of the target id, the content of its
//! recipe and watched files, and the digests of its dependencies. Everything
//! else about an artifact (tag, labels, build args, build options) is derived
//! from digests, so changing one byte of a watched file changes the tag of the
//! target and of every target downstream of it.
//!
//! Digests are memoized for the lifetime of a [`DigestEngine`].

mod options;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, info_span};

use crate::artifact::Artifact;
use crate::config::{Config, TargetDef};
use crate::error::{Error, Result};
use crate::util::hash::{HashAlgorithm, hash_bytes, hash_file};
use crate::util::walk::{IgnorePatterns, walk};

pub use options::BuildOptions;

/// Computes and memoizes per-target digests, tags and build options for one run.
pub struct DigestEngine<'a> {
  config: &'a Config,
  repo: String,
  algorithm: HashAlgorithm,
  ignore: IgnorePatterns,
  tags: HashMap<String, String>,
  digests: HashMap<String, String>,
  in_progress: HashSet<String>,
}

impl<'a> DigestEngine<'a> {
  /// Create an engine for `repo`. `tags` holds explicit tags that take
  /// precedence over digest-derived ones.
  ///
  /// Fails with `HashAlgorithmNotFound` before touching any file if the
  /// configured algorithm is unsupported.
  pub fn new(config: &'a Config, repo: impl Into<String>, tags: BTreeMap<String, String>) -> Result<Self> {
    Ok(DigestEngine {
      config,
      repo: repo.into(),
      algorithm: config.options.algorithm()?,
      ignore: config.options.ignore_patterns()?,
      tags: tags.into_iter().collect(),
      digests: HashMap::new(),
      in_progress: HashSet::new(),
    })
  }

  pub fn repo(&self) -> &str {
    &self.repo
  }

  pub fn algorithm(&self) -> HashAlgorithm {
    self.algorithm
  }

  /// Digest of `target`, computing the digests of its dependencies first.
  pub fn digest(&mut self, target: &str) -> Result<String> {
    if let Some(digest) = self.digests.get(target) {
      return Ok(digest.clone());
    }

    let config = self.config;
    let def = config.get_target(target)?;
    if !self.in_progress.insert(target.to_string()) {
      return Err(Error::TargetCyclic(target.to_string()));
    }

    let mut dependency_digests = Vec::with_capacity(def.depends_on.len());
    for dependency in &def.depends_on {
      match self.digest(dependency) {
        Ok(digest) => dependency_digests.push((dependency.as_str(), digest)),
        Err(e) => {
          self.in_progress.remove(target);
          return Err(e);
        }
      }
    }

    let result = self.compute_digest(target, def, &dependency_digests);
    self.in_progress.remove(target);

    let digest = result?;
    self.digests.insert(target.to_string(), digest.clone());
    Ok(digest)
  }

  fn compute_digest(&self, target: &str, def: &TargetDef, dependencies: &[(&str, String)]) -> Result<String> {
    let _span = info_span!("target", id = %target).entered();
    let alg = self.algorithm;
    let mut hasher = alg.hasher();

    let salt = hash_bytes(alg, target.as_bytes());
    hasher.update(&salt);
    info!("target_salt {}:{}", alg, salt);

    for path in self.watched_files(def)? {
      let digest = hash_file(alg, &path, self.config.options.hash_chunk_size)?;
      hasher.update(&digest);
      info!("file_digest {} {}:{}", path.display(), alg, digest);
    }

    for (dependency, digest) in dependencies {
      hasher.update(digest);
      info!("depends_on {} {}:{}", dependency, alg, digest);
    }

    let digest = hasher.finalize_hex();
    info!("target_digest {}:{}", alg, digest);
    Ok(digest)
  }

  /// Files hashed into a target's digest: the recipe, then each watched
  /// path in order, with directories expanded to their sorted file list.
  pub fn watched_files(&self, def: &TargetDef) -> Result<Vec<PathBuf>> {
    let mut files = vec![def.dockerfile.clone()];

    for path in &def.watch_files {
      if path.is_dir() {
        let expanded = walk(path, &self.ignore)?;
        debug!(path = %path.display(), files = expanded.len(), "expanded watched directory");
        files.extend(expanded);
      } else {
        files.push(path.clone());
      }
    }

    Ok(files)
  }

  /// Explicit tag if one was given, otherwise the digest prefix.
  pub fn tag(&mut self, target: &str) -> Result<String> {
    if let Some(tag) = self.tags.get(target) {
      return Ok(tag.clone());
    }

    let digest = self.digest(target)?;
    let size = self.config.options.short_digest_size.min(digest.len());
    let tag = digest[..size].to_string();
    self.tags.insert(target.to_string(), tag.clone());
    Ok(tag)
  }

  pub fn labels(&mut self, target: &str) -> Result<BTreeMap<String, String>> {
    let digest = self.digest(target)?;
    let options = &self.config.options;

    Ok(BTreeMap::from([
      (options.target_label.clone(), target.to_string()),
      (options.digest_label.clone(), format!("{}:{}", self.algorithm, digest)),
    ]))
  }

  /// One build arg per dependency, pointing at the dependency's artifact name.
  pub fn build_args(&mut self, target: &str) -> Result<BTreeMap<String, String>> {
    let config = self.config;
    let def = config.get_target(target)?;
    let mut args = BTreeMap::new();

    for dependency in &def.depends_on {
      let key = format!("{}{}", config.options.buildarg_prefix, dependency);
      let tag = self.tag(dependency)?;
      args.insert(key, format!("{}:{}", self.repo, tag));
    }

    Ok(args)
  }

  pub fn build_options(&mut self, target: &str) -> Result<BuildOptions> {
    let config = self.config;
    let def = config.get_target(target)?;
    let tag = self.tag(target)?;
    let name = format!("{}:{}", self.repo, tag);

    let mut options = BuildOptions::new(
      def.dockerfile.to_string_lossy(),
      name,
      self.labels(target)?,
      self.build_args(target)?,
    );
    options.apply_overrides(&def.build_options);
    Ok(options)
  }

  /// Create the artifact for `target` with its derived tag and build options.
  pub fn artifact(&mut self, target: &str) -> Result<Artifact> {
    let tag = self.tag(target)?;
    let build_options = self.build_options(target)?;
    Ok(Artifact::new(target, self.repo.clone(), tag, build_options))
  }
}
