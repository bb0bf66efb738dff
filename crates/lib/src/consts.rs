//! Default values for configuration options.

use crate::error::ErrorKind;

pub const DEFAULT_CONFIG_FILE: &str = "prefab.yml";

pub const DEFAULT_ALLOWED_PULL_ERRORS: &[ErrorKind] =
  &[ErrorKind::ImageAccess, ErrorKind::ImageNotFound, ErrorKind::ImageValidation];

pub const DEFAULT_BUILD_ON_VALIDATE_ERROR: bool = true;
pub const DEFAULT_BUILDARG_PREFIX: &str = "prefab_";
pub const DEFAULT_DIGEST_LABEL: &str = "prefab.digest";
pub const DEFAULT_HASH_ALGORITHM: &str = "sha256";
pub const DEFAULT_HASH_CHUNK_SIZE: usize = 65535;
pub const DEFAULT_IGNORE_FILES: &[&str] = &[".git/", "__pycache__/", "*.pyc", ".*.swp"];
pub const DEFAULT_PRUNE_AFTER_BUILD: bool = false;
pub const DEFAULT_SHORT_DIGEST_SIZE: usize = 12;
pub const DEFAULT_TARGET_LABEL: &str = "prefab.target";
pub const DEFAULT_VALIDATE_IMAGE: bool = true;

/// Build context passed to the engine unless a target overrides `path`.
pub const DEFAULT_BUILD_CONTEXT: &str = ".";
