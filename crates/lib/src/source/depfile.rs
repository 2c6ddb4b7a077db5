//! Make-style dependency files.
//!
//! A depfile holds a single rule on its first line:
//!
//! ```text
//! out/app.dill out/app.d: lib/main.dart lib/my\ widget.dart
//! ```
//!
//! Tokens are separated by whitespace, `\ ` is a literal space, and every
//! other backslash is kept as written so Windows paths survive unchanged.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepfileError {
  #[error("failed to read depfile {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid depfile {path}: missing ': ' separator")]
  Malformed { path: PathBuf },
}

/// The inputs and outputs listed by one depfile rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depfile {
  pub inputs: Vec<PathBuf>,
  pub outputs: Vec<PathBuf>,
}

impl Depfile {
  pub fn new(inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Self {
    Self { inputs, outputs }
  }

  /// Parse depfile text. Returns `None` if the first line is not a rule.
  pub fn parse_str(text: &str) -> Option<Self> {
    let line = text.lines().next()?.trim_end();

    let (lhs, rhs) = match line.split_once(": ") {
      Some(parts) => parts,
      None => (line.strip_suffix(':')?, ""),
    };

    Some(Self {
      inputs: split_tokens(rhs).into_iter().map(PathBuf::from).collect(),
      outputs: split_tokens(lhs).into_iter().map(PathBuf::from).collect(),
    })
  }

  /// Read and parse a depfile from disk.
  pub fn parse(path: &Path) -> Result<Self, DepfileError> {
    let text = std::fs::read_to_string(path).map_err(|source| DepfileError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    Self::parse_str(&text).ok_or_else(|| DepfileError::Malformed {
      path: path.to_path_buf(),
    })
  }

  /// Render the rule, escaping spaces inside paths.
  pub fn render(&self) -> String {
    let mut out = join_paths(&self.outputs);
    out.push(':');
    if !self.inputs.is_empty() {
      out.push(' ');
      out.push_str(&join_paths(&self.inputs));
    }
    out.push('\n');
    out
  }

  pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
    std::fs::write(path, self.render())
  }
}

fn join_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|path| path.to_string_lossy().replace(' ', "\\ "))
    .collect::<Vec<_>>()
    .join(" ")
}

fn split_tokens(text: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    if c == '\\' && chars.peek() == Some(&' ') {
      current.push(' ');
      chars.next();
    } else if c.is_whitespace() {
      if !current.is_empty() {
        tokens.push(std::mem::take(&mut current));
      }
    } else {
      current.push(c);
    }
  }
  if !current.is_empty() {
    tokens.push(current);
  }

  tokens
}
