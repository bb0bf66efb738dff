//! Composed build options handed to the container engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BuildOptionOverrides;
use crate::consts::DEFAULT_BUILD_CONTEXT;

/// Options for one engine build.
///
/// Serializes with sorted keys; `extra` holds engine-specific settings taken
/// verbatim from the target's `build_options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
  pub buildargs: BTreeMap<String, String>,
  pub dockerfile: String,
  pub forcerm: bool,
  pub labels: BTreeMap<String, String>,
  pub path: String,
  pub rm: bool,
  /// Full `repo:tag` name given to the built artifact.
  pub tag: String,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl BuildOptions {
  pub fn new(
    dockerfile: impl Into<String>,
    tag: impl Into<String>,
    labels: BTreeMap<String, String>,
    buildargs: BTreeMap<String, String>,
  ) -> Self {
    BuildOptions {
      buildargs,
      dockerfile: dockerfile.into(),
      forcerm: true,
      labels,
      path: DEFAULT_BUILD_CONTEXT.to_string(),
      rm: true,
      tag: tag.into(),
      extra: BTreeMap::new(),
    }
  }

  /// Apply a target's overrides: `labels` and `buildargs` are merged per key,
  /// everything else replaces the current value.
  pub fn apply_overrides(&mut self, overrides: &BuildOptionOverrides) {
    if let Some(labels) = &overrides.labels {
      self.labels.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(buildargs) = &overrides.buildargs {
      self.buildargs.extend(buildargs.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(dockerfile) = &overrides.dockerfile {
      self.dockerfile = dockerfile.clone();
    }
    if let Some(path) = &overrides.path {
      self.path = path.clone();
    }
    if let Some(tag) = &overrides.tag {
      self.tag = tag.clone();
    }
    if let Some(rm) = overrides.rm {
      self.rm = rm;
    }
    if let Some(forcerm) = overrides.forcerm {
      self.forcerm = forcerm;
    }
    self.extra.extend(overrides.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
  }

  /// Pretty JSON with sorted keys and four-space indentation.
  pub fn to_pretty_json(&self) -> String {
    let value = serde_json::to_value(self).unwrap_or(Value::Null);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    if value.serialize(&mut serializer).is_err() {
      return value.to_string();
    }
    String::from_utf8_lossy(&out).into_owned()
  }
}
