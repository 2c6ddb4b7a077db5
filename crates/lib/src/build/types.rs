use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::filestore::HashStrategy;
use crate::source::{Depfile, ResolveError};

/// Errors that stop a `build()` call.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The requested target, or one of its dependencies, is not registered.
  #[error("no such target: {0}")]
  UnknownTarget(String),

  /// A target with this name is already registered.
  #[error("target {0} is already registered")]
  DuplicateTarget(String),

  /// The dependency graph contains a cycle.
  #[error("dependency cycle detected: {}", cycle.join(" -> "))]
  Cycle { cycle: Vec<String> },

  /// A required input does not exist.
  #[error("target {target} is missing an input: {source}")]
  MissingInput {
    target: String,
    #[source]
    source: ResolveError,
  },

  /// The action finished without producing a declared output.
  #[error("target {target} did not produce an output: {source}")]
  MissingOutput {
    target: String,
    #[source]
    source: ResolveError,
  },

  /// A source pattern is malformed or uses unsupported globbing.
  #[error("target {target} declares an invalid source: {source}")]
  InvalidPattern {
    target: String,
    #[source]
    source: ResolveError,
  },

  /// Sources could not be resolved because of an I/O failure.
  #[error("failed to resolve sources of target {target}: {source}")]
  Resolve {
    target: String,
    #[source]
    source: ResolveError,
  },

  /// A stamp could not be removed.
  #[error("failed to remove stamp of target {target}: {source}")]
  Stamp {
    target: String,
    #[source]
    source: io::Error,
  },

  /// The target's action returned an error.
  #[error("target {target} failed: {source}")]
  ActionFailed {
    target: String,
    #[source]
    source: anyhow::Error,
  },
}

/// Configuration for a `BuildSystem`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildConfig {
  pub hash_strategy: HashStrategy,
}

/// Outcome of a successful `build()` call.
#[derive(Debug, Default)]
pub struct BuildSummary {
  /// Targets whose action ran, in execution order.
  pub performed: Vec<String>,

  /// Targets found up to date, in execution order.
  pub skipped: Vec<String>,

  /// Every input file of every target, without duplicates.
  pub input_files: Vec<PathBuf>,

  /// Every output file of every target, without duplicates.
  pub output_files: Vec<PathBuf>,

  /// Wall time spent on each target, including the staleness check.
  pub durations: Vec<(String, Duration)>,

  seen_inputs: HashSet<PathBuf>,
  seen_outputs: HashSet<PathBuf>,
}

impl BuildSummary {
  pub fn was_performed(&self, target: &str) -> bool {
    self.performed.iter().any(|name| name == target)
  }

  pub fn was_skipped(&self, target: &str) -> bool {
    self.skipped.iter().any(|name| name == target)
  }

  pub(crate) fn record_files(&mut self, inputs: &[PathBuf], outputs: &[PathBuf]) {
    for input in inputs {
      if self.seen_inputs.insert(input.clone()) {
        self.input_files.push(input.clone());
      }
    }
    for output in outputs {
      if self.seen_outputs.insert(output.clone()) {
        self.output_files.push(output.clone());
      }
    }
  }

  /// Depfile describing the whole build: all outputs depend on all inputs.
  pub fn depfile(&self) -> Depfile {
    Depfile::new(self.input_files.clone(), self.output_files.clone())
  }

  pub fn write_depfile(&self, path: &Path) -> io::Result<()> {
    self.depfile().write_to_file(path)
  }
}
