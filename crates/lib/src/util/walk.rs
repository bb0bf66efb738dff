//! Watched-path expansion.
//!
//! Directories listed in `watch_files` are expanded into the sorted list of
//! files below them, skipping anything matched by the `ignore_files` patterns.
//! A pattern ending in `/` only prunes directories; any other pattern prunes
//! both directories and files. Patterns are matched against the entry's file
//! name and against its full path.

use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

use super::hash::HashError;

/// Compiled `ignore_files` patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
  dirs: Vec<Pattern>,
  files: Vec<Pattern>,
}

impl IgnorePatterns {
  pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, HashError> {
    let mut ignore = IgnorePatterns::default();

    for raw in patterns {
      let raw = raw.as_ref();
      let compile = |p: &str| {
        Pattern::new(p).map_err(|e| HashError::InvalidPattern {
          pattern: raw.to_string(),
          message: e.to_string(),
        })
      };

      match raw.strip_suffix('/') {
        Some(dir_only) => ignore.dirs.push(compile(dir_only)?),
        None => {
          let pattern = compile(raw)?;
          ignore.dirs.push(pattern.clone());
          ignore.files.push(pattern);
        }
      }
    }

    Ok(ignore)
  }

  fn matches(patterns: &[Pattern], name: Option<&str>, path: &str) -> bool {
    patterns
      .iter()
      .any(|p| name.is_some_and(|n| p.matches(n)) || p.matches(path))
  }

  fn ignores_dir(&self, entry: &DirEntry) -> bool {
    let path = entry.path().to_string_lossy();
    // The walk root is only matched by its full path.
    let name = if entry.depth() == 0 {
      None
    } else {
      entry.file_name().to_str()
    };
    Self::matches(&self.dirs, name, &path)
  }

  fn ignores_file(&self, path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str());
    Self::matches(&self.files, name, &path.to_string_lossy())
  }
}

/// Strip `.` components and trailing separators so that `src/` and `./src`
/// produce the same entry paths as `src`.
fn normalize(path: &Path) -> PathBuf {
  let normalized: PathBuf = path
    .components()
    .filter(|c| !matches!(c, std::path::Component::CurDir))
    .collect();
  if normalized.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    normalized
  }
}

/// Recursively list the files below `root`, sorted by their string form.
pub fn walk(root: &Path, ignore: &IgnorePatterns) -> Result<Vec<PathBuf>, HashError> {
  let root = normalize(root);
  let mut files = Vec::new();

  let walker = WalkDir::new(&root)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| !(e.file_type().is_dir() && ignore.ignores_dir(e)));

  for entry in walker {
    let entry = entry.map_err(|e| HashError::WalkDir {
      path: root.display().to_string(),
      message: e.to_string(),
    })?;

    if entry.file_type().is_dir() {
      continue;
    }

    let path = entry.into_path();
    if path.is_file() && !ignore.ignores_file(&path) {
      files.push(path);
    }
  }

  files.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
  Ok(files)
}
