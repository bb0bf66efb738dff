//! Container engine backed by the `docker` command line client.
//!
//! Long-running commands are spawned with piped output and their stdout is
//! read line by line as the caller iterates. stderr is drained on a separate
//! thread so the child never blocks on a full pipe; it becomes the error
//! message when the command exits unsuccessfully.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{BufRead, BufReader, Lines, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use serde_json::Value;
use tracing::debug;

use super::{BuildEntry, BuildStream, ContainerEngine, EngineError, TransferEntry, TransferStream};
use crate::digest::BuildOptions;

/// Substrings of docker error output that mean the artifact does not exist.
const NOT_FOUND_MARKERS: &[&str] = &["not found", "manifest unknown", "no such image", "does not exist"];

/// `build_options` keys whose docker CLI flag is not the key with dashes.
const FLAG_ALIASES: &[(&str, &str)] = &[
  ("cache_from", "cache-from"),
  ("extra_hosts", "add-host"),
  ("network_mode", "network"),
  ("nocache", "no-cache"),
  ("shmsize", "shm-size"),
];

#[derive(Debug, Clone)]
pub struct DockerCli {
  program: String,
}

impl Default for DockerCli {
  fn default() -> Self {
    Self::new("docker")
  }
}

impl DockerCli {
  pub fn new(program: impl Into<String>) -> Self {
    DockerCli { program: program.into() }
  }

  fn command(&self, args: &[String]) -> Command {
    debug!(program = %self.program, args = ?args, "running engine command");
    let mut command = Command::new(&self.program);
    command.args(args).stdin(Stdio::null());
    command
  }

  fn spawn_error(&self, source: std::io::Error) -> EngineError {
    EngineError::Spawn {
      program: self.program.clone(),
      source,
    }
  }

  /// Run a short command to completion and return its stdout.
  fn run(&self, args: &[String]) -> Result<String, EngineError> {
    let output = self.command(args).output().map_err(|e| self.spawn_error(e))?;
    if !output.status.success() {
      return Err(classify(&String::from_utf8_lossy(&output.stderr), output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Spawn a long-running command whose stdout is consumed lazily.
  fn stream(&self, args: &[String], forward_stderr: bool) -> Result<ProcessLines, EngineError> {
    let mut child = self
      .command(args)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| self.spawn_error(e))?;

    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| EngineError::Api(format!("{}: stdout not captured", self.program)))?;
    let stderr = child.stderr.take().map(|mut pipe| {
      std::thread::spawn(move || {
        let mut text = String::new();
        let _ = pipe.read_to_string(&mut text);
        text
      })
    });

    Ok(ProcessLines {
      program: self.program.clone(),
      child,
      lines: BufReader::new(stdout).lines(),
      stderr,
      forward_stderr,
      trailing: VecDeque::new(),
      finished: false,
    })
  }
}

/// Lines of a running process's stdout, ending with an error if it fails.
struct ProcessLines {
  program: String,
  child: Child,
  lines: Lines<BufReader<ChildStdout>>,
  stderr: Option<JoinHandle<String>>,
  /// Emit stderr lines after stdout when the process succeeds.
  forward_stderr: bool,
  trailing: VecDeque<String>,
  finished: bool,
}

impl ProcessLines {
  fn finish(&mut self) -> Result<(), EngineError> {
    let status = self.child.wait().map_err(|source| EngineError::Spawn {
      program: self.program.clone(),
      source,
    })?;
    let stderr = self.stderr.take().and_then(|h| h.join().ok()).unwrap_or_default();

    if !status.success() {
      return Err(classify(&stderr, status));
    }
    if self.forward_stderr {
      self.trailing.extend(stderr.lines().map(str::to_string));
    }
    Ok(())
  }
}

impl Iterator for ProcessLines {
  type Item = Result<String, EngineError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return self.trailing.pop_front().map(Ok);
    }

    match self.lines.next() {
      Some(Ok(line)) => Some(Ok(line)),
      Some(Err(e)) => {
        self.finished = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
        Some(Err(EngineError::Api(format!("failed to read {} output: {}", self.program, e))))
      }
      None => {
        self.finished = true;
        match self.finish() {
          Ok(()) => self.trailing.pop_front().map(Ok),
          Err(e) => Some(Err(e)),
        }
      }
    }
  }
}

impl Drop for ProcessLines {
  fn drop(&mut self) {
    if !self.finished {
      let _ = self.child.kill();
      let _ = self.child.wait();
    }
  }
}

fn classify(stderr: &str, status: ExitStatus) -> EngineError {
  let message = stderr.trim();
  let message = if message.is_empty() {
    format!("command failed with {}", status)
  } else {
    message.to_string()
  };

  let lower = message.to_lowercase();
  if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
    EngineError::NotFound(message)
  } else {
    EngineError::Api(message)
  }
}

/// Parse one line of `docker pull`/`docker push` output.
///
/// Lines of the form `<id>: <status>` carry a layer (or tag) id.
pub(crate) fn parse_transfer_line(line: &str) -> Option<TransferEntry> {
  let line = line.trim();
  if line.is_empty() {
    return None;
  }

  if let Some((id, status)) = line.split_once(": ")
    && !id.is_empty()
    && !id.contains(char::is_whitespace)
  {
    return Some(TransferEntry {
      id: Some(id.to_string()),
      ..TransferEntry::status(status)
    });
  }

  Some(TransferEntry::status(line))
}

fn flag_name(key: &str) -> String {
  FLAG_ALIASES
    .iter()
    .find(|(alias, _)| *alias == key)
    .map(|(_, flag)| flag.to_string())
    .unwrap_or_else(|| key.replace('_', "-"))
}

fn scalar(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn push_extra(args: &mut Vec<String>, key: &str, value: &Value) {
  let flag = format!("--{}", flag_name(key));
  match value {
    Value::Null | Value::Bool(false) => {}
    Value::Bool(true) => args.push(flag),
    Value::Array(items) => {
      for item in items {
        args.push(flag.clone());
        args.push(scalar(item));
      }
    }
    Value::Object(map) => {
      for (k, v) in map {
        args.push(flag.clone());
        args.push(format!("{}={}", k, scalar(v)));
      }
    }
    other => {
      args.push(flag);
      args.push(scalar(other));
    }
  }
}

pub(crate) fn list_args(repo: &str) -> Vec<String> {
  vec![
    "image".to_string(),
    "ls".to_string(),
    "--format".to_string(),
    "{{.Repository}}:{{.Tag}}".to_string(),
    repo.to_string(),
  ]
}

pub(crate) fn build_args(options: &BuildOptions) -> Vec<String> {
  let mut args = vec![
    "build".to_string(),
    "--file".to_string(),
    options.dockerfile.clone(),
    "--tag".to_string(),
    options.tag.clone(),
  ];

  for (key, value) in &options.labels {
    args.push("--label".to_string());
    args.push(format!("{}={}", key, value));
  }
  for (key, value) in &options.buildargs {
    args.push("--build-arg".to_string());
    args.push(format!("{}={}", key, value));
  }
  args.push(format!("--rm={}", options.rm));
  args.push(format!("--force-rm={}", options.forcerm));

  for (key, value) in &options.extra {
    push_extra(&mut args, key, value);
  }

  args.push(options.path.clone());
  args
}

impl ContainerEngine for DockerCli {
  fn list_artifacts(&self, repo: &str) -> Result<BTreeSet<String>, EngineError> {
    let stdout = self.run(&list_args(repo))?;
    Ok(
      stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  fn pull(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    let lines = self.stream(&["pull".to_string(), format!("{}:{}", repo, tag)], false)?;
    Ok(Box::new(lines.filter_map(|line| match line {
      Ok(line) => parse_transfer_line(&line).map(Ok),
      Err(e) => Some(Err(e)),
    })))
  }

  fn build(&self, options: &BuildOptions) -> Result<BuildStream, EngineError> {
    let lines = self.stream(&build_args(options), true)?;
    Ok(Box::new(lines.map(|line| line.map(BuildEntry::stream))))
  }

  fn push(&self, repo: &str, tag: &str) -> Result<TransferStream, EngineError> {
    let lines = self.stream(&["push".to_string(), format!("{}:{}", repo, tag)], false)?;
    Ok(Box::new(lines.filter_map(|line| match line {
      Ok(line) => parse_transfer_line(&line).map(Ok),
      Err(e) => Some(Err(e)),
    })))
  }

  fn get_labels(&self, name: &str) -> Result<BTreeMap<String, String>, EngineError> {
    let args = [
      "image".to_string(),
      "inspect".to_string(),
      "--format".to_string(),
      "{{json .Config.Labels}}".to_string(),
      name.to_string(),
    ];
    let stdout = self.run(&args)?;
    let labels: Option<BTreeMap<String, String>> = serde_json::from_str(stdout.trim())
      .map_err(|e| EngineError::Api(format!("unexpected labels for {}: {}", name, e)))?;
    Ok(labels.unwrap_or_default())
  }

  fn remove(&self, name: &str) -> Result<(), EngineError> {
    self.run(&["image".to_string(), "rm".to_string(), name.to_string()])?;
    Ok(())
  }

  fn prune_dangling(&self) -> Result<(), EngineError> {
    let args = [
      "image".to_string(),
      "prune".to_string(),
      "--force".to_string(),
      "--filter".to_string(),
      "dangling=true".to_string(),
    ];
    self.run(&args)?;
    Ok(())
  }
}
