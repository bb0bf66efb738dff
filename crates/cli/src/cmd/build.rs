//! Implementation of the `prefab` build run.
//!
//! Loads the build config, builds every requested target with the docker
//! engine (or the fake engine on a dry run), then pushes the requested images.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use prefab_lib::{Config, ContainerEngine, DockerCli, FakeEngine, Orchestrator};

use crate::output::{highlight, print_elapsed, print_header};

/// Everything one run needs, parsed from the command line.
#[derive(Debug, Clone)]
pub struct BuildArgs {
  pub config: PathBuf,
  pub repo: String,
  pub targets: Vec<String>,
  /// Explicit tags by target name.
  pub tags: BTreeMap<String, String>,
  pub push: Vec<String>,
  pub force: bool,
  pub dry_run: bool,
}

/// Execute a build run.
///
/// `called_with` is the raw argument list, echoed in the run header.
pub fn cmd_build(args: &BuildArgs, called_with: &[String]) -> Result<()> {
  let start = Instant::now();

  let config = Config::from_path(&args.config).context("Failed to load build config")?;

  print_header(&format!("Container Prefab v:{}", env!("CARGO_PKG_VERSION")));
  info!("Called with args: {}", highlight(&serde_json::to_string(called_with)?));
  info!("Loaded config file: {}", highlight(&args.config.display().to_string()));

  print_header("Config options:");
  for (name, value) in config.options.entries() {
    info!("{}: {}", name, highlight(&value.to_string()));
  }

  if args.dry_run {
    run_with(FakeEngine::new(), &config, args, start)
  } else {
    run_with(DockerCli::default(), &config, args, start)
  }
}

fn run_with<E: ContainerEngine>(engine: E, config: &Config, args: &BuildArgs, start: Instant) -> Result<()> {
  let mut orchestrator =
    Orchestrator::new(config, engine, &args.repo, args.tags.clone()).context("Failed to prepare build")?;

  orchestrator.build(&args.targets, args.force).context("Build failed")?;
  print_elapsed("Build elapsed time:", start.elapsed());

  if !args.push.is_empty() {
    let push_start = Instant::now();
    orchestrator.push(&args.push).context("Push failed")?;
    print_elapsed("Push elapsed time: ", push_start.elapsed());
    print_elapsed("Total elapsed time:", start.elapsed());
  }

  Ok(())
}
