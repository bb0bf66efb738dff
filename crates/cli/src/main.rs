mod cmd;
mod output;

use std::collections::{BTreeMap, HashSet};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cmd::BuildArgs;
use prefab_lib::consts::DEFAULT_CONFIG_FILE;

/// Build container images faster
#[derive(Parser, Debug)]
#[command(name = "prefab")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Target build config file to use
  #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
  config: PathBuf,

  /// Show how targets would be built (implies --force)
  #[arg(long)]
  dry_run: bool,

  /// Force target(s) to be rebuilt
  #[arg(long)]
  force: bool,

  /// Don't colorize log messages
  #[arg(short, long)]
  monochrome: bool,

  /// Image target(s) to push to repo after building
  #[arg(short, long, value_name = "TARGET_NAME", num_args = 1..)]
  push: Vec<String>,

  /// Image repo to use (e.g. quay.io/lexsca/prefab)
  #[arg(short, long, value_name = "URI")]
  repo: String,

  /// Image target(s) to build with optional custom image tag
  #[arg(short = 't', long = "target", value_name = "TARGET_NAME[:TAG]", num_args = 1.., required = true)]
  targets: Vec<String>,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn build_args(&self) -> Result<BuildArgs, String> {
    let (targets, tags) = split_targets(&self.targets)?;
    Ok(BuildArgs {
      config: self.config.clone(),
      repo: self.repo.clone(),
      targets,
      tags,
      push: self.push.clone(),
      force: self.force || self.dry_run,
      dry_run: self.dry_run,
    })
  }
}

/// Split `NAME[:TAG]` arguments into target names and explicit tags.
///
/// An explicit tag may be given to at most one target.
fn split_targets(args: &[String]) -> Result<(Vec<String>, BTreeMap<String, String>), String> {
  let mut targets = Vec::with_capacity(args.len());
  let mut tags = BTreeMap::new();
  let mut seen = HashSet::new();

  for arg in args {
    let (name, tag) = arg.split_once(':').unwrap_or((arg.as_str(), ""));
    targets.push(name.to_string());

    if tag.is_empty() {
      continue;
    }
    if !seen.insert(tag) {
      return Err(format!("Duplicate tag: {}", tag));
    }
    tags.insert(name.to_string(), tag.to_string());
  }

  Ok((targets, tags))
}

fn init_logging(verbose: bool, monochrome: bool) {
  if monochrome {
    owo_colors::set_override(false);
  }

  let default_level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(!monochrome && std::io::stderr().is_terminal())
    .with_target(false)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  let args = match cli.build_args() {
    Ok(args) => args,
    Err(message) => Cli::command().error(ErrorKind::ValueValidation, message).exit(),
  };

  init_logging(cli.verbose, cli.monochrome);

  let called_with: Vec<String> = std::env::args().skip(1).collect();
  match cmd::cmd_build(&args, &called_with) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{:?}", err));
      ExitCode::FAILURE
    }
  }
}
