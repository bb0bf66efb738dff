//! Build configuration loading and validation.
//!
//! A configuration file has an optional `options` section and a required,
//! non-empty `targets` section. Structural problems are reported as
//! [`Error::InvalidConfig`] with a message naming the offending target.

mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub use types::{BuildOptionOverrides, Options, TargetDef};

/// Validated build configuration, immutable for the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub options: Options,
  pub targets: BTreeMap<String, TargetDef>,
  /// File the configuration was loaded from, if any.
  pub path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RawConfig {
  #[serde(default)]
  options: Options,
  targets: BTreeMap<String, TargetDef>,
}

impl Config {
  pub fn from_yaml_str(content: &str) -> Result<Self> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    validate_structure(&value)?;

    let raw: RawConfig = serde_yaml::from_value(value).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    validate_options(&raw.options)?;

    Ok(Config {
      options: raw.options,
      targets: raw.targets,
      path: None,
    })
  }

  pub fn from_path(path: &Path) -> Result<Self> {
    debug!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
      path: path.display().to_string(),
      source,
    })?;

    let mut config = Self::from_yaml_str(&content)?;
    config.path = Some(path.to_path_buf());
    Ok(config)
  }

  pub fn get_target(&self, name: &str) -> Result<&TargetDef> {
    self
      .targets
      .get(name)
      .ok_or_else(|| Error::TargetNotFound(name.to_string()))
  }
}

fn invalid(message: impl Into<String>) -> Error {
  Error::InvalidConfig(message.into())
}

fn key_name(key: &Value) -> String {
  match key {
    Value::String(s) => s.clone(),
    other => serde_yaml::to_string(other)
      .map(|s| s.trim().to_string())
      .unwrap_or_default(),
  }
}

fn validate_structure(root: &Value) -> Result<()> {
  let empty = Mapping::new();
  let root = match root {
    Value::Mapping(m) => m,
    Value::Null => &empty,
    _ => return Err(invalid("dict expected for config file")),
  };

  if let Some(options) = root.get("options")
    && !matches!(options, Value::Mapping(_) | Value::Null)
  {
    return Err(invalid("dict expected for options section"));
  }

  let targets = match root.get("targets") {
    None => return Err(invalid("targets section missing")),
    Some(Value::Mapping(targets)) => targets,
    Some(_) => return Err(invalid("dict expected for targets section")),
  };

  if targets.is_empty() {
    return Err(invalid("no targets defined"));
  }

  for (name, target) in targets {
    validate_target(&key_name(name), target)?;
  }

  Ok(())
}

fn validate_target(name: &str, target: &Value) -> Result<()> {
  let Value::Mapping(target) = target else {
    return Err(invalid(format!("{}: dict expected", name)));
  };

  if !matches!(target.get("dockerfile"), Some(Value::String(_))) {
    return Err(invalid(format!("{}: dockerfile required in target config", name)));
  }

  for key in ["depends_on", "watch_files"] {
    if let Some(value) = target.get(key)
      && !value.is_sequence()
    {
      return Err(invalid(format!("{}: list expected for {}", name, key)));
    }
  }

  if let Some(value) = target.get("build_options")
    && !value.is_mapping()
  {
    return Err(invalid(format!("{}: dict expected for build_options", name)));
  }

  Ok(())
}

fn validate_options(options: &Options) -> Result<()> {
  if options.short_digest_size == 0 {
    return Err(invalid("short_digest_size must be positive"));
  }
  if options.hash_chunk_size == 0 {
    return Err(invalid("hash_chunk_size must be positive"));
  }
  options.algorithm()?;
  options.ignore_patterns()?;
  Ok(())
}
