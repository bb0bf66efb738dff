//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const REPO: &str = "registry.test/prefab";

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated build context.
///
/// Each test gets its own temporary directory holding `prefab.yml`, the
/// Dockerfiles the fixtures refer to and a small `src/` tree.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file.
  ///
  /// Copies the fixture content to a temporary `prefab.yml` file.
  pub fn from_fixture(name: &str) -> Self {
    let env = Self::empty();
    std::fs::write(&env.config_path, fixture_content(name)).unwrap();
    env
  }

  /// Create a build context without a config file.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("prefab.yml");
    let env = Self { temp, config_path };
    env.write_file("Dockerfile.base", "FROM scratch\n");
    env.write_file("Dockerfile.app", "ARG prefab_base\nFROM $prefab_base\nCOPY src /src\n");
    env.write_file("src/main.txt", "hello\n");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Get a pre-configured Command for the prefab binary.
  ///
  /// Runs from the temp directory so relative recipe paths resolve, with
  /// colors off and the log level left to the command line.
  pub fn prefab_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("prefab");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("RUST_LOG");
    cmd.arg("--monochrome");
    cmd
  }

  /// A dry run against [`REPO`] building `targets`.
  pub fn dry_run(&self, targets: &[&str]) -> Command {
    let mut cmd = self.prefab_cmd();
    cmd.args(["--dry-run", "--repo", REPO, "--target"]).args(targets);
    cmd
  }
}

/// Stderr of a finished command as text.
pub fn stderr_of(output: &std::process::Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Index of the first line mentioning both `span` and `needle`.
pub fn line_index(log: &str, span: &str, needle: &str) -> Option<usize> {
  log.lines().position(|line| line.contains(span) && line.contains(needle))
}
