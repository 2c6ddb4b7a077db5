//! Stamp storage.
//!
//! A stamp records what a target was last built from and what it produced.
//! One stamp exists per (target, build mode, platform) at
//! `<build_dir>/<target>.<mode>.<platform>.stamp`.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::STAMP_EXTENSION;
use crate::environment::Environment;
use crate::util::fs::{read_json, write_json_atomic};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
  /// `(absolute path, hash)` of every input, in resolution order.
  pub inputs: Vec<(String, String)>,
  /// Absolute paths of every output.
  pub outputs: Vec<String>,
  pub build_number: Option<String>,
}

impl Stamp {
  pub fn new(inputs: Vec<(PathBuf, String)>, outputs: &[PathBuf], build_number: Option<String>) -> Self {
    Self {
      inputs: inputs
        .into_iter()
        .map(|(path, hash)| (path.to_string_lossy().into_owned(), hash))
        .collect(),
      outputs: outputs.iter().map(|path| path.to_string_lossy().into_owned()).collect(),
      build_number,
    }
  }

  /// Load the stamp of `target`.
  ///
  /// Returns `None` if it was never written or cannot be read, which callers
  /// treat as "never built".
  pub fn load(environment: &Environment, target: &str) -> Option<Self> {
    let path = stamp_path(environment, target);
    match read_json(&path) {
      Ok(stamp) => stamp,
      Err(e) => {
        warn!(path = ?path, error = %e, "ignoring unreadable stamp");
        None
      }
    }
  }

  /// Write the stamp of `target`, replacing any previous one.
  pub fn save(&self, environment: &Environment, target: &str) -> io::Result<()> {
    std::fs::create_dir_all(&environment.build_dir)?;
    write_json_atomic(&stamp_path(environment, target), self)
  }

  /// Recorded input hashes, sorted by path.
  pub fn sorted_inputs(&self) -> Vec<(&str, &str)> {
    let mut inputs: Vec<(&str, &str)> = self
      .inputs
      .iter()
      .map(|(path, hash)| (path.as_str(), hash.as_str()))
      .collect();
    inputs.sort_unstable();
    inputs
  }

  /// Recorded outputs that no longer exist.
  pub fn missing_outputs(&self) -> impl Iterator<Item = &str> {
    self
      .outputs
      .iter()
      .map(String::as_str)
      .filter(|output| !Path::new(output).exists())
  }
}

pub fn stamp_path(environment: &Environment, target: &str) -> PathBuf {
  environment.build_dir.join(format!(
    "{}.{}.{}.{}",
    target, environment.build_mode, environment.platform, STAMP_EXTENSION
  ))
}

/// Delete the stamp of `target`, forcing its next build to run.
pub fn invalidate(environment: &Environment, target: &str) -> io::Result<()> {
  match std::fs::remove_file(stamp_path(environment, target)) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}
