//! Test utilities for kiln-lib.
//!
//! `TestProject` owns a temporary project directory and an `Environment`
//! pointing into it, so tests can lay out files and build against them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::environment::{ArtifactLocator, BuildMode, Environment, TargetPlatform};

pub struct TestProject {
  pub temp: TempDir,
  pub env: Environment,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Environment::new(temp.path(), BuildMode::Debug, TargetPlatform::Tester);
    std::fs::create_dir_all(&env.build_dir).unwrap();
    Self { temp, env }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the project root, returning its absolute path.
  pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn env_with_artifacts(&self, artifacts: impl ArtifactLocator + 'static) -> Environment {
    self.env.clone().with_artifacts(Arc::new(artifacts))
  }
}
