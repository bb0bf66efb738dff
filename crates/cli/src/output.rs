//! CLI output formatting utilities.
//!
//! Section headers, highlighted values and elapsed-time reports are written
//! through the log so they interleave with the build's own messages.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};
use tracing::info;

pub mod symbols {
  pub const ERROR: &str = "✗";
}

/// One award per elapsed-time bracket, fastest first.
const AWARDS: [&str; 6] = ["⚡", "🚀", "🥇", "🥈", "🥉", "🐢"];

/// Award for a run that took `elapsed`: under ten seconds, then one per
/// started minute up to four, then the tortoise.
pub fn award(elapsed: Duration) -> &'static str {
  let secs = elapsed.as_secs();
  let bracket = if secs < 10 {
    0
  } else if secs < 240 {
    1 + secs / 60
  } else {
    5
  };
  AWARDS[bracket as usize]
}

/// `H:MM:SS.cc`
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  format!(
    "{}:{:02}:{:02}.{:02}",
    secs / 3600,
    secs / 60 % 60,
    secs % 60,
    elapsed.subsec_millis() / 10
  )
}

pub fn highlight(value: &str) -> String {
  value.if_supports_color(Stream::Stderr, |s| s.cyan()).to_string()
}

pub fn print_header(title: &str) {
  info!("{}", title.if_supports_color(Stream::Stderr, |s| s.magenta()));
}

pub fn print_elapsed(label: &str, elapsed: Duration) {
  info!(
    "{} {} {}",
    label.if_supports_color(Stream::Stderr, |s| s.yellow()),
    format_elapsed(elapsed),
    award(elapsed)
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}
