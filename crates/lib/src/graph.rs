//! Dependency resolution for build targets.
//!
//! # Algorithm Overview
//!
//! Build orders are produced by a depth-first walk over `depends_on`, visiting
//! dependencies in declared order and appending each target after all of its
//! dependencies. Cycles are detected with the set of edges on the active path
//! rather than a set of visited targets, so a shared dependency reached through
//! several parents (a diamond) is not mistaken for a cycle, while any cycle,
//! self-loops included, repeats an edge that is still on the path.

use std::collections::HashSet;

use tracing::trace;

use crate::config::Config;
use crate::error::{Error, Result};

/// Resolve the dependency-first build order of `target`.
///
/// Each target appears exactly once and `target` itself is last.
///
/// # Errors
///
/// - [`Error::TargetNotFound`] if `target` or any transitive dependency is not configured
/// - [`Error::TargetCyclic`] naming the target whose dependency edge closes a cycle
pub fn resolve(config: &Config, target: &str) -> Result<Vec<String>> {
  let mut order = Vec::new();
  let mut path = HashSet::new();
  visit(config, target, &mut path, &mut order)?;
  trace!(root = target, order = ?order, "resolved build order");
  Ok(order)
}

fn visit<'a>(
  config: &'a Config,
  target: &'a str,
  path: &mut HashSet<(&'a str, &'a str)>,
  order: &mut Vec<String>,
) -> Result<()> {
  let def = config.get_target(target)?;

  for dependency in &def.depends_on {
    let edge = (target, dependency.as_str());
    if !path.insert(edge) {
      return Err(Error::TargetCyclic(target.to_string()));
    }
    visit(config, dependency, path, order)?;
    path.remove(&edge);
  }

  if !order.iter().any(|t| t == target) {
    order.push(target.to_string());
  }

  Ok(())
}
