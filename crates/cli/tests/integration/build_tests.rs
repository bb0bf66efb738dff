//! Build run integration tests.

use predicates::prelude::*;

use super::common::{REPO, TestEnv, line_index, stderr_of};

#[test]
fn dry_run_builds_dependencies_first() {
  let env = TestEnv::from_fixture("chain.yml");

  let output = env.dry_run(&["app"]).output().unwrap();
  assert!(output.status.success());

  let log = stderr_of(&output);
  assert!(log.contains("Resolving build targets"));
  assert!(log.contains("Building [app] target with dependencies: [base]"));
  assert!(log.contains("Build elapsed time:"));

  let base = line_index(&log, "id=base", "Build succeeded").expect("base built");
  let app = line_index(&log, "id=app", "Build succeeded").expect("app built");
  assert!(base < app);
}

#[test]
fn dry_run_never_tries_to_pull() {
  let env = TestEnv::from_fixture("chain.yml");

  env
    .dry_run(&["app"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Trying build..."))
    .stderr(predicate::str::contains("Trying pull...").not())
    .stderr(predicate::str::contains("Image loaded").not());
}

#[test]
fn header_lists_config_and_options() {
  let env = TestEnv::from_fixture("diamond.yml");

  env
    .dry_run(&["a"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Container Prefab v:"))
    .stderr(predicate::str::contains("Called with args: [\"--monochrome\",\"--dry-run\""))
    .stderr(predicate::str::contains("Loaded config file: prefab.yml"))
    .stderr(predicate::str::contains("hash_algorithm: \"sha512\""))
    .stderr(predicate::str::contains("short_digest_size: 8"))
    .stderr(predicate::str::contains("validate_image: true"));
}

#[test]
fn diamond_builds_shared_dependency_once() {
  let env = TestEnv::from_fixture("diamond.yml");

  let output = env.dry_run(&["a"]).output().unwrap();
  assert!(output.status.success());

  let log = stderr_of(&output);
  assert!(log.contains("Building [a] target with dependencies: [c], [b], [d]"));
  assert_eq!(log.matches("Build succeeded").count(), 4);

  let d = line_index(&log, "id=d", "Build succeeded").unwrap();
  let b = line_index(&log, "id=b", "Build succeeded").unwrap();
  let c = line_index(&log, "id=c", "Build succeeded").unwrap();
  let a = line_index(&log, "id=a", "Build succeeded").unwrap();
  assert!(d < b && b < c && c < a);
}

#[test]
fn digest_tags_are_truncated() {
  let env = TestEnv::from_fixture("diamond.yml");

  let output = env.dry_run(&["d"]).output().unwrap();
  assert!(output.status.success());

  let log = stderr_of(&output);
  let line = log
    .lines()
    .find(|l| l.contains("target_image"))
    .expect("target_image logged");
  let tag = line.rsplit(':').next().unwrap().trim();
  assert_eq!(tag.len(), 8);
  assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn explicit_tag_names_the_image() {
  let env = TestEnv::from_fixture("chain.yml");

  env
    .dry_run(&["app:v1"])
    .assert()
    .success()
    .stderr(predicate::str::contains(format!("target_image {}:v1", REPO)))
    .stderr(predicate::str::contains(format!("\"prefab_base\": \"{}:", REPO)));
}

#[test]
fn verbose_logs_digest_components() {
  let env = TestEnv::from_fixture("chain.yml");

  env
    .dry_run(&["app"])
    .arg("-v")
    .assert()
    .success()
    .stderr(predicate::str::contains("target_salt sha256:"))
    .stderr(predicate::str::contains("file_digest Dockerfile.app sha256:"))
    .stderr(predicate::str::contains("depends_on base sha256:"))
    .stderr(predicate::str::contains("target_digest sha256:"));
}

#[test]
fn unchanged_tree_gives_same_tags() {
  let env = TestEnv::from_fixture("chain.yml");

  let first = stderr_of(&env.dry_run(&["app"]).output().unwrap());
  let second = stderr_of(&env.dry_run(&["app"]).output().unwrap());
  let image = |log: &str| {
    log
      .lines()
      .find(|l| l.contains("id=app") && l.contains("target_image"))
      .map(str::to_string)
  };
  assert!(image(&first).is_some());
  assert_eq!(image(&first), image(&second));

  env.write_file("src/main.txt", "hello!\n");
  let third = stderr_of(&env.dry_run(&["app"]).output().unwrap());
  assert_ne!(image(&first), image(&third));
}

#[test]
fn unknown_target_fails() {
  let env = TestEnv::from_fixture("chain.yml");

  env
    .dry_run(&["nope"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Build failed"))
    .stderr(predicate::str::contains("Target [nope] not found in build config"));
}

#[test]
fn cyclic_config_fails() {
  let env = TestEnv::from_fixture("cyclic.yml");

  env
    .dry_run(&["a"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("has circular dependencies"))
    .stderr(predicate::str::contains("Trying build...").not());
}

#[test]
fn missing_config_fails() {
  let env = TestEnv::empty();

  env
    .dry_run(&["app"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to load build config"))
    .stderr(predicate::str::contains("failed to read config file prefab.yml"));
}

#[test]
fn config_flag_selects_file() {
  let env = TestEnv::empty();
  env.write_file("conf/other.yml", &super::common::fixture_content("chain.yml"));

  env
    .dry_run(&["base"])
    .args(["--config", "conf/other.yml"])
    .assert()
    .success()
    .stderr(predicate::str::contains("Loaded config file: conf/other.yml"));
}

#[test]
fn unsupported_hash_algorithm_fails() {
  let env = TestEnv::from_fixture("bad_algorithm.yml");

  env
    .dry_run(&["base"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("hash algorithm md4 not found"));
}

#[test]
fn empty_targets_section_fails() {
  let env = TestEnv::from_fixture("no_targets.yml");

  env
    .dry_run(&["base"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("no targets defined"));
}
