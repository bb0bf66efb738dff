//! Hashing utilities for content digests.
//!
//! This module provides:
//! - `HashAlgorithm`: the closed set of supported digest algorithms
//! - `Hasher`: a running hash over one of those algorithms
//! - `hash_file()`: chunked single file hashing
//! - `hash_bytes()`: arbitrary byte hashing

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

/// Error during file hashing or input discovery.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum HashError {
  #[error("hash algorithm {name} not found")]
  UnsupportedAlgorithm { name: String },

  #[error("failed to walk directory {path}: {message}")]
  WalkDir { path: String, message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("invalid ignore pattern {pattern}: {message}")]
  InvalidPattern { pattern: String, message: String },
}

/// Digest algorithm used for file and target digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
  Sha224,
  Sha256,
  Sha384,
  Sha512,
}

impl HashAlgorithm {
  pub fn name(self) -> &'static str {
    match self {
      HashAlgorithm::Sha224 => "sha224",
      HashAlgorithm::Sha256 => "sha256",
      HashAlgorithm::Sha384 => "sha384",
      HashAlgorithm::Sha512 => "sha512",
    }
  }

  pub fn hasher(self) -> Hasher {
    match self {
      HashAlgorithm::Sha224 => Hasher::Sha224(Sha224::new()),
      HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
      HashAlgorithm::Sha384 => Hasher::Sha384(Sha384::new()),
      HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
    }
  }
}

impl fmt::Display for HashAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for HashAlgorithm {
  type Err = HashError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "sha224" => Ok(HashAlgorithm::Sha224),
      "sha256" => Ok(HashAlgorithm::Sha256),
      "sha384" => Ok(HashAlgorithm::Sha384),
      "sha512" => Ok(HashAlgorithm::Sha512),
      other => Err(HashError::UnsupportedAlgorithm { name: other.to_string() }),
    }
  }
}

/// Running hash state for one of the supported algorithms.
pub enum Hasher {
  Sha224(Sha224),
  Sha256(Sha256),
  Sha384(Sha384),
  Sha512(Sha512),
}

impl Hasher {
  pub fn update(&mut self, data: impl AsRef<[u8]>) {
    match self {
      Hasher::Sha224(h) => h.update(data),
      Hasher::Sha256(h) => h.update(data),
      Hasher::Sha384(h) => h.update(data),
      Hasher::Sha512(h) => h.update(data),
    }
  }

  /// Consume the hasher and return the lowercase hex digest.
  pub fn finalize_hex(self) -> String {
    match self {
      Hasher::Sha224(h) => hex::encode(h.finalize()),
      Hasher::Sha256(h) => hex::encode(h.finalize()),
      Hasher::Sha384(h) => hex::encode(h.finalize()),
      Hasher::Sha512(h) => hex::encode(h.finalize()),
    }
  }
}

/// Hash a file's contents, reading `chunk_size` bytes at a time.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path, chunk_size: usize) -> Result<String, HashError> {
  let read_error = |e: std::io::Error| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_error)?;
  let file_len = file.metadata().map_err(read_error)?.len();
  // never allocate more than the file needs, whatever the configured chunk size
  let buffer_len = usize::try_from(file_len).map_or(chunk_size, |len| chunk_size.min(len));
  let mut hasher = algorithm.hasher();
  let mut buffer = vec![0u8; buffer_len.max(1)];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hasher.finalize_hex())
}

/// Hash arbitrary bytes.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
  let mut hasher = algorithm.hasher();
  hasher.update(data);
  hasher.finalize_hex()
}
