use std::fmt;
use std::path::PathBuf;

use crate::environment::Environment;
use crate::source::Source;

/// The work a target performs when it is stale.
///
/// Receives the resolved input files and is responsible for writing the
/// target's declared outputs.
pub trait Action: Send + Sync {
  fn invoke(&self, inputs: &[PathBuf], environment: &Environment) -> anyhow::Result<()>;
}

impl<F> Action for F
where
  F: Fn(&[PathBuf], &Environment) -> anyhow::Result<()> + Send + Sync,
{
  fn invoke(&self, inputs: &[PathBuf], environment: &Environment) -> anyhow::Result<()> {
    self(inputs, environment)
  }
}

fn no_action(_: &[PathBuf], _: &Environment) -> anyhow::Result<()> {
  Ok(())
}

/// A named build step.
///
/// Dependencies are target names looked up in the owning `BuildSystem`, so
/// several targets can share a dependency and cycles can be detected rather
/// than constructed.
pub struct Target {
  name: String,
  inputs: Vec<Source>,
  outputs: Vec<Source>,
  dependencies: Vec<String>,
  phony: bool,
  action: Box<dyn Action>,
}

impl Target {
  pub fn builder(name: impl Into<String>) -> TargetBuilder {
    TargetBuilder {
      name: name.into(),
      inputs: Vec::new(),
      outputs: Vec::new(),
      dependencies: Vec::new(),
      phony: false,
      action: Box::new(no_action),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn inputs(&self) -> &[Source] {
    &self.inputs
  }

  pub fn outputs(&self) -> &[Source] {
    &self.outputs
  }

  pub fn dependencies(&self) -> &[String] {
    &self.dependencies
  }

  /// Phony targets have no tracked outputs and always run.
  pub fn is_phony(&self) -> bool {
    self.phony
  }

  pub fn action(&self) -> &dyn Action {
    self.action.as_ref()
  }
}

impl fmt::Debug for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Target")
      .field("name", &self.name)
      .field("inputs", &self.inputs)
      .field("outputs", &self.outputs)
      .field("dependencies", &self.dependencies)
      .field("phony", &self.phony)
      .finish_non_exhaustive()
  }
}

pub struct TargetBuilder {
  name: String,
  inputs: Vec<Source>,
  outputs: Vec<Source>,
  dependencies: Vec<String>,
  phony: bool,
  action: Box<dyn Action>,
}

impl TargetBuilder {
  pub fn input(mut self, source: Source) -> Self {
    self.inputs.push(source);
    self
  }

  pub fn output(mut self, source: Source) -> Self {
    self.outputs.push(source);
    self
  }

  pub fn depends_on(mut self, target: impl Into<String>) -> Self {
    self.dependencies.push(target.into());
    self
  }

  pub fn phony(mut self, phony: bool) -> Self {
    self.phony = phony;
    self
  }

  /// Set the action from a closure.
  pub fn action<F>(mut self, action: F) -> Self
  where
    F: Fn(&[PathBuf], &Environment) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.action = Box::new(action);
    self
  }

  /// Set the action from any `Action` implementation.
  pub fn with_action(mut self, action: impl Action + 'static) -> Self {
    self.action = Box::new(action);
    self
  }

  pub fn build(self) -> Target {
    Target {
      name: self.name,
      inputs: self.inputs,
      outputs: self.outputs,
      dependencies: self.dependencies,
      phony: self.phony,
      action: self.action,
    }
  }
}
