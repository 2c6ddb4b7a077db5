//! Build execution.
//!
//! `BuildSystem` owns the registered targets. A `build()` call resolves the
//! dependency graph from the requested target, then walks it in dependency
//! order: each target's sources are resolved, hashed and compared against its
//! stamp, and its action runs only when something changed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, warn};

use super::graph::TargetGraph;
use super::store::{self, Stamp};
use super::target::Target;
use super::types::{BuildConfig, BuildError, BuildSummary};
use crate::environment::Environment;
use crate::filestore::FileHashStore;
use crate::source::{ResolveError, Resolved, SourceRole};
use crate::source::resolver::{resolve, resolve_lenient};

#[derive(Debug, Default)]
pub struct BuildSystem {
  config: BuildConfig,
  targets: HashMap<String, Target>,
}

impl BuildSystem {
  pub fn new(config: BuildConfig) -> Self {
    Self {
      config,
      targets: HashMap::new(),
    }
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  /// Register a target. Names are unique within a build system.
  pub fn register(&mut self, target: Target) -> Result<(), BuildError> {
    if self.targets.contains_key(target.name()) {
      return Err(BuildError::DuplicateTarget(target.name().to_string()));
    }
    self.targets.insert(target.name().to_string(), target);
    Ok(())
  }

  pub fn target(&self, name: &str) -> Option<&Target> {
    self.targets.get(name)
  }

  /// Registered target names, sorted.
  pub fn target_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.targets.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  /// Build `name` and everything it depends on.
  ///
  /// The dependency graph is checked for unknown targets and cycles before any
  /// action runs. Targets then run one at a time, dependencies first, and the
  /// first failure stops the build. The file hash cache is written back
  /// whether or not the build succeeds.
  pub fn build(&self, name: &str, environment: &Environment) -> Result<BuildSummary, BuildError> {
    let graph = TargetGraph::resolve(&self.targets, name)?;
    let order = graph.execution_order();

    info!(target = %name, targets = graph.target_count(), "starting build");

    let mut store = FileHashStore::new(&environment.build_dir, self.config.hash_strategy);
    store.initialize();

    let mut summary = BuildSummary::default();
    let result = order
      .iter()
      .try_for_each(|target| self.build_target(target, environment, &mut store, &mut summary));

    store.persist();
    result?;

    info!(
      target = %name,
      performed = summary.performed.len(),
      skipped = summary.skipped.len(),
      "build finished"
    );
    Ok(summary)
  }

  /// Delete the stamps of `name` and everything it depends on, so the next
  /// `build()` runs all of them. Returns the number of targets invalidated.
  pub fn invalidate(&self, name: &str, environment: &Environment) -> Result<usize, BuildError> {
    let graph = TargetGraph::resolve(&self.targets, name)?;
    for target in graph.execution_order() {
      store::invalidate(environment, &target).map_err(|source| BuildError::Stamp {
        target: target.clone(),
        source,
      })?;
    }

    info!(target = %name, targets = graph.target_count(), "invalidated stamps");
    Ok(graph.target_count())
  }

  /// Describe a target for tooling.
  ///
  /// Paths are resolved leniently: files that do not exist are left out.
  pub fn describe(&self, name: &str, environment: &Environment) -> Result<serde_json::Value, BuildError> {
    let target = self
      .targets
      .get(name)
      .ok_or_else(|| BuildError::UnknownTarget(name.to_string()))?;

    let inputs = resolve_lenient(environment, SourceRole::Inputs, target.inputs())
      .map_err(|e| resolve_error(name, SourceRole::Inputs, e))?;
    let outputs = resolve_lenient(environment, SourceRole::Outputs, target.outputs())
      .map_err(|e| resolve_error(name, SourceRole::Outputs, e))?;

    Ok(json!({
      "name": target.name(),
      "dependencies": target.dependencies(),
      "inputs": path_strings(&inputs.files),
      "outputs": path_strings(&outputs.files),
      "phony": target.is_phony(),
    }))
  }

  fn build_target(
    &self,
    name: &str,
    environment: &Environment,
    store: &mut FileHashStore,
    summary: &mut BuildSummary,
  ) -> Result<(), BuildError> {
    let started = Instant::now();
    let target = self
      .targets
      .get(name)
      .ok_or_else(|| BuildError::UnknownTarget(name.to_string()))?;

    let inputs = resolve(environment, SourceRole::Inputs, target.inputs())
      .map_err(|e| resolve_error(name, SourceRole::Inputs, e))?;
    store.hash_files(&inputs.files);

    let Some(reason) = stale_reason(target, environment, &inputs, store)? else {
      debug!(target = %name, "skipping up-to-date target");
      let outputs = resolve_lenient(environment, SourceRole::Outputs, target.outputs())
        .map_err(|e| resolve_error(name, SourceRole::Outputs, e))?;
      summary.record_files(&inputs.files, &outputs.files);
      summary.skipped.push(name.to_string());
      summary.durations.push((name.to_string(), started.elapsed()));
      return Ok(());
    };

    info!(target = %name, reason, "running target");
    target
      .action()
      .invoke(&inputs.files, environment)
      .map_err(|source| BuildError::ActionFailed {
        target: name.to_string(),
        source,
      })?;

    // Depfiles written by the action are visible now.
    let inputs = resolve(environment, SourceRole::Inputs, target.inputs())
      .map_err(|e| resolve_error(name, SourceRole::Inputs, e))?;
    let outputs = if target.is_phony() {
      resolve_lenient(environment, SourceRole::Outputs, target.outputs())
    } else {
      resolve(environment, SourceRole::Outputs, target.outputs())
    }
    .map_err(|e| resolve_error(name, SourceRole::Outputs, e))?;

    store.hash_files(&inputs.files);
    let hashed: Vec<(PathBuf, String)> = inputs
      .files
      .iter()
      .filter_map(|file| store.current_hash(file).map(|hash| (file.clone(), hash.to_string())))
      .collect();

    let stamp = Stamp::new(hashed, &outputs.files, environment.build_number.clone());
    if let Err(e) = stamp.save(environment, name) {
      warn!(target = %name, error = %e, "failed to write stamp");
    }

    summary.record_files(&inputs.files, &outputs.files);
    summary.performed.push(name.to_string());
    summary.durations.push((name.to_string(), started.elapsed()));
    Ok(())
  }
}

/// Why `target` must run, or `None` when its stamp still matches.
fn stale_reason(
  target: &Target,
  environment: &Environment,
  inputs: &Resolved,
  store: &FileHashStore,
) -> Result<Option<&'static str>, BuildError> {
  if target.is_phony() {
    return Ok(Some("phony"));
  }
  if inputs.contains_new_depfile {
    return Ok(Some("new input depfile"));
  }

  let Some(stamp) = Stamp::load(environment, target.name()) else {
    return Ok(Some("never built"));
  };

  if stamp.build_number != environment.build_number {
    return Ok(Some("build number changed"));
  }

  let mut current = Vec::with_capacity(inputs.files.len());
  for file in &inputs.files {
    let Some(hash) = store.current_hash(file) else {
      debug!(target = %target.name(), path = ?file, "input could not be hashed");
      return Ok(Some("unreadable input"));
    };
    current.push((file.to_string_lossy().into_owned(), hash));
  }
  current.sort_unstable();
  current.dedup();

  let mut recorded = stamp.sorted_inputs();
  recorded.dedup();
  let unchanged = current.len() == recorded.len()
    && current
      .iter()
      .zip(&recorded)
      .all(|((path, hash), (old_path, old_hash))| path == old_path && hash == old_hash);
  if !unchanged {
    return Ok(Some("inputs changed"));
  }

  if let Some(output) = stamp.missing_outputs().next() {
    debug!(target = %target.name(), path = output, "recorded output is missing");
    return Ok(Some("output missing"));
  }

  match resolve(environment, SourceRole::Outputs, target.outputs()) {
    Ok(outputs) if outputs.contains_new_depfile => Ok(Some("new output depfile")),
    Ok(_) => Ok(None),
    Err(e) if e.is_missing() => Ok(Some("output missing")),
    Err(e) => Err(resolve_error(target.name(), SourceRole::Outputs, e)),
  }
}

fn resolve_error(target: &str, role: SourceRole, source: ResolveError) -> BuildError {
  let target = target.to_string();
  match (&source, role) {
    (ResolveError::InvalidPattern { .. }, _) => BuildError::InvalidPattern { target, source },
    (ResolveError::Io { .. }, _) => BuildError::Resolve { target, source },
    (_, SourceRole::Inputs) => BuildError::MissingInput { target, source },
    (_, SourceRole::Outputs) => BuildError::MissingOutput { target, source },
  }
}

fn path_strings(paths: &[PathBuf]) -> Vec<String> {
  paths.iter().map(|path| path.to_string_lossy().into_owned()).collect()
}
