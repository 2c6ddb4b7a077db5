//! Build environment.
//!
//! The `Environment` is supplied by the caller and borrowed read-only by the
//! engine for one `build()` call. It maps each symbolic root token to a
//! concrete directory and carries the build mode and target platform that key
//! stamps and artifact lookups.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::source::Root;

/// Compilation mode of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
  Debug,
  Profile,
  Release,
  JitRelease,
}

impl BuildMode {
  pub fn as_str(self) -> &'static str {
    match self {
      BuildMode::Debug => "debug",
      BuildMode::Profile => "profile",
      BuildMode::Release => "release",
      BuildMode::JitRelease => "jit_release",
    }
  }
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for BuildMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "debug" => Ok(BuildMode::Debug),
      "profile" => Ok(BuildMode::Profile),
      "release" => Ok(BuildMode::Release),
      "jit_release" => Ok(BuildMode::JitRelease),
      other => Err(format!("unknown build mode: {}", other)),
    }
  }
}

/// Platform the build output is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPlatform {
  Android,
  AndroidArm,
  AndroidArm64,
  AndroidX64,
  Ios,
  Darwin,
  LinuxX64,
  LinuxArm64,
  WindowsX64,
  FuchsiaArm64,
  FuchsiaX64,
  WebJavascript,
  Tester,
}

impl TargetPlatform {
  pub fn as_str(self) -> &'static str {
    match self {
      TargetPlatform::Android => "android",
      TargetPlatform::AndroidArm => "android_arm",
      TargetPlatform::AndroidArm64 => "android_arm64",
      TargetPlatform::AndroidX64 => "android_x64",
      TargetPlatform::Ios => "ios",
      TargetPlatform::Darwin => "darwin",
      TargetPlatform::LinuxX64 => "linux_x64",
      TargetPlatform::LinuxArm64 => "linux_arm64",
      TargetPlatform::WindowsX64 => "windows_x64",
      TargetPlatform::FuchsiaArm64 => "fuchsia_arm64",
      TargetPlatform::FuchsiaX64 => "fuchsia_x64",
      TargetPlatform::WebJavascript => "web_javascript",
      TargetPlatform::Tester => "tester",
    }
  }
}

impl fmt::Display for TargetPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Locates prebuilt tool-chain artifacts.
///
/// Implemented by the caller's artifact cache. Returning `None` means the
/// artifact is not available for the requested mode and platform.
pub trait ArtifactLocator: Send + Sync {
  fn artifact_path(
    &self,
    artifact: &str,
    mode: Option<BuildMode>,
    platform: Option<TargetPlatform>,
  ) -> Option<PathBuf>;
}

/// Artifact locator that knows no artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArtifacts;

impl ArtifactLocator for NoArtifacts {
  fn artifact_path(&self, _: &str, _: Option<BuildMode>, _: Option<TargetPlatform>) -> Option<PathBuf> {
    None
  }
}

/// Artifact locator backed by a fixed table, keyed by artifact name only.
#[derive(Debug, Default, Clone)]
pub struct StaticArtifacts {
  paths: BTreeMap<String, PathBuf>,
}

impl StaticArtifacts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, artifact: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    self.paths.insert(artifact.into(), path.into());
    self
  }
}

impl ArtifactLocator for StaticArtifacts {
  fn artifact_path(&self, artifact: &str, _: Option<BuildMode>, _: Option<TargetPlatform>) -> Option<PathBuf> {
    self.paths.get(artifact).cloned()
  }
}

/// Concrete context for one build invocation.
#[derive(Clone)]
pub struct Environment {
  pub project_dir: PathBuf,
  pub build_dir: PathBuf,
  pub output_dir: PathBuf,
  pub cache_dir: PathBuf,
  pub flutter_root: PathBuf,
  pub build_mode: BuildMode,
  pub platform: TargetPlatform,
  /// Recorded in stamps; a change invalidates every target.
  pub build_number: Option<String>,
  /// Free-form configuration visible to target actions.
  pub defines: BTreeMap<String, String>,
  pub artifacts: Arc<dyn ArtifactLocator>,
}

impl fmt::Debug for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Environment")
      .field("project_dir", &self.project_dir)
      .field("build_dir", &self.build_dir)
      .field("output_dir", &self.output_dir)
      .field("cache_dir", &self.cache_dir)
      .field("flutter_root", &self.flutter_root)
      .field("build_mode", &self.build_mode)
      .field("platform", &self.platform)
      .field("build_number", &self.build_number)
      .field("defines", &self.defines)
      .finish_non_exhaustive()
  }
}

impl Environment {
  /// Create an environment rooted at `project_dir`.
  ///
  /// The build directory defaults to `<project>/build/kiln`, the output
  /// directory to `<project>/build` and the cache directory to
  /// `<project>/.kiln_cache`. Use the `with_*` methods to override.
  pub fn new(project_dir: impl Into<PathBuf>, build_mode: BuildMode, platform: TargetPlatform) -> Self {
    let project_dir = project_dir.into();
    Self {
      build_dir: project_dir.join("build").join("kiln"),
      output_dir: project_dir.join("build"),
      cache_dir: project_dir.join(".kiln_cache"),
      flutter_root: project_dir.clone(),
      project_dir,
      build_mode,
      platform,
      build_number: None,
      defines: BTreeMap::new(),
      artifacts: Arc::new(NoArtifacts),
    }
  }

  pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.build_dir = dir.into();
    self
  }

  pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = dir.into();
    self
  }

  pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cache_dir = dir.into();
    self
  }

  pub fn with_flutter_root(mut self, dir: impl Into<PathBuf>) -> Self {
    self.flutter_root = dir.into();
    self
  }

  pub fn with_build_number(mut self, number: impl Into<String>) -> Self {
    self.build_number = Some(number.into());
    self
  }

  pub fn with_define(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.defines.insert(key.into(), value.into());
    self
  }

  pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactLocator>) -> Self {
    self.artifacts = artifacts;
    self
  }

  /// Directory a root token resolves to.
  pub fn root_dir(&self, root: Root) -> &Path {
    match root {
      Root::ProjectDir => &self.project_dir,
      Root::BuildDir => &self.build_dir,
      Root::OutputDir => &self.output_dir,
      Root::CacheDir => &self.cache_dir,
      Root::FlutterRoot => &self.flutter_root,
    }
  }
}
