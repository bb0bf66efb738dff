//! Typed configuration structures.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::consts::*;
use crate::error::{ErrorKind, Result};
use crate::util::hash::HashAlgorithm;
use crate::util::walk::IgnorePatterns;

/// Definition of a single build target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
  /// Build recipe; always the first file hashed into the target digest.
  pub dockerfile: PathBuf,
  #[serde(default)]
  pub depends_on: Vec<String>,
  /// Files or directories whose content feeds the target digest.
  #[serde(default)]
  pub watch_files: Vec<PathBuf>,
  #[serde(default)]
  pub build_options: BuildOptionOverrides,
}

/// Per-target build option overrides.
///
/// `labels` and `buildargs` are merged key by key into the derived values;
/// every other key replaces the derived value outright. Keys the engine
/// understands but prefab does not derive (`nocache`, `target`, ...) are kept
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptionOverrides {
  #[serde(default, deserialize_with = "scalar_map", skip_serializing_if = "Option::is_none")]
  pub buildargs: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dockerfile: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub forcerm: Option<bool>,
  #[serde(default, deserialize_with = "scalar_map", skip_serializing_if = "Option::is_none")]
  pub labels: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rm: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

/// Map whose values may be any scalar; numbers and booleans become strings.
fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<Option<BTreeMap<String, String>>, D::Error>
where
  D: Deserializer<'de>,
{
  let Some(raw) = Option::<BTreeMap<String, Value>>::deserialize(deserializer)? else {
    return Ok(None);
  };

  raw
    .into_iter()
    .map(|(key, value)| match value {
      Value::String(s) => Ok((key, s)),
      Value::Number(n) => Ok((key, n.to_string())),
      Value::Bool(b) => Ok((key, b.to_string())),
      other => Err(D::Error::custom(format!("{}: scalar value expected, got {}", key, other))),
    })
    .collect::<std::result::Result<_, _>>()
    .map(Some)
}

/// Run-wide options from the `options` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
  pub allowed_pull_errors: BTreeSet<ErrorKind>,
  pub build_on_validate_error: bool,
  pub buildarg_prefix: String,
  pub digest_label: String,
  pub hash_algorithm: String,
  pub hash_chunk_size: usize,
  pub ignore_files: Vec<String>,
  pub prune_after_build: bool,
  pub short_digest_size: usize,
  pub target_label: String,
  pub validate_image: bool,
}

impl Default for Options {
  fn default() -> Self {
    Options {
      allowed_pull_errors: DEFAULT_ALLOWED_PULL_ERRORS.iter().copied().collect(),
      build_on_validate_error: DEFAULT_BUILD_ON_VALIDATE_ERROR,
      buildarg_prefix: DEFAULT_BUILDARG_PREFIX.to_string(),
      digest_label: DEFAULT_DIGEST_LABEL.to_string(),
      hash_algorithm: DEFAULT_HASH_ALGORITHM.to_string(),
      hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
      ignore_files: DEFAULT_IGNORE_FILES.iter().map(|s| s.to_string()).collect(),
      prune_after_build: DEFAULT_PRUNE_AFTER_BUILD,
      short_digest_size: DEFAULT_SHORT_DIGEST_SIZE,
      target_label: DEFAULT_TARGET_LABEL.to_string(),
      validate_image: DEFAULT_VALIDATE_IMAGE,
    }
  }
}

impl Options {
  /// Every option with its effective value, in display order.
  pub fn entries(&self) -> Vec<(&'static str, Value)> {
    vec![
      ("allowed_pull_errors", json!(self.allowed_pull_errors)),
      ("build_on_validate_error", json!(self.build_on_validate_error)),
      ("buildarg_prefix", json!(self.buildarg_prefix)),
      ("digest_label", json!(self.digest_label)),
      ("hash_algorithm", json!(self.hash_algorithm)),
      ("hash_chunk_size", json!(self.hash_chunk_size)),
      ("ignore_files", json!(self.ignore_files)),
      ("prune_after_build", json!(self.prune_after_build)),
      ("short_digest_size", json!(self.short_digest_size)),
      ("target_label", json!(self.target_label)),
      ("validate_image", json!(self.validate_image)),
    ]
  }

  pub fn algorithm(&self) -> Result<HashAlgorithm> {
    Ok(self.hash_algorithm.parse()?)
  }

  pub fn ignore_patterns(&self) -> Result<IgnorePatterns> {
    Ok(IgnorePatterns::new(&self.ignore_files)?)
  }

  pub fn allows_pull_error(&self, kind: ErrorKind) -> bool {
    self.allowed_pull_errors.contains(&kind)
  }
}
