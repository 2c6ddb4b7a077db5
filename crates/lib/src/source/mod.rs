//! Declarative file references.
//!
//! A `Source` names zero or more files relative to the build `Environment`
//! without touching the filesystem. Resolution into concrete paths happens
//! later through a `SourceVisitor`, which may run several times per build
//! (once for the staleness check and once more for the new stamp).

pub mod depfile;
pub mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::environment::{BuildMode, TargetPlatform};

pub use depfile::{Depfile, DepfileError};
pub use resolver::{Resolved, ResolveError, SourceRole, SourceVisitor};

/// Symbolic root directory a pattern starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
  ProjectDir,
  BuildDir,
  OutputDir,
  CacheDir,
  FlutterRoot,
}

impl Root {
  pub const ALL: [Root; 5] = [
    Root::ProjectDir,
    Root::BuildDir,
    Root::OutputDir,
    Root::CacheDir,
    Root::FlutterRoot,
  ];

  /// The token written at the start of a pattern, e.g. `{PROJECT_DIR}`.
  pub fn token(self) -> &'static str {
    match self {
      Root::ProjectDir => "{PROJECT_DIR}",
      Root::BuildDir => "{BUILD_DIR}",
      Root::OutputDir => "{OUTPUT_DIR}",
      Root::CacheDir => "{CACHE_DIR}",
      Root::FlutterRoot => "{FLUTTER_ROOT}",
    }
  }

  pub fn from_token(token: &str) -> Option<Root> {
    Root::ALL.into_iter().find(|root| root.token() == token)
  }
}

impl fmt::Display for Root {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.token())
  }
}

/// A declarative, environment-parameterized reference to files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
  /// `{ROOT}/relative/path`, optionally with one `*` in the final segment.
  Pattern { pattern: String, optional: bool },
  /// A prebuilt tool-chain artifact located through the environment.
  Artifact {
    artifact: String,
    mode: Option<BuildMode>,
    platform: Option<TargetPlatform>,
  },
  /// A depfile written by a previous invocation, relative to the build directory.
  Depfile { name: String },
}

impl Source {
  pub fn pattern(pattern: impl Into<String>) -> Self {
    Source::Pattern {
      pattern: pattern.into(),
      optional: false,
    }
  }

  /// A pattern whose absence is not an error.
  pub fn optional_pattern(pattern: impl Into<String>) -> Self {
    Source::Pattern {
      pattern: pattern.into(),
      optional: true,
    }
  }

  pub fn artifact(artifact: impl Into<String>) -> Self {
    Source::Artifact {
      artifact: artifact.into(),
      mode: None,
      platform: None,
    }
  }

  pub fn artifact_for(artifact: impl Into<String>, mode: Option<BuildMode>, platform: Option<TargetPlatform>) -> Self {
    Source::Artifact {
      artifact: artifact.into(),
      mode,
      platform,
    }
  }

  pub fn depfile(name: impl Into<String>) -> Self {
    Source::Depfile { name: name.into() }
  }

  /// Dispatch to the matching `visit_*` method.
  pub fn accept(&self, visitor: &mut SourceVisitor<'_>) -> Result<(), ResolveError> {
    match self {
      Source::Pattern { pattern, optional } => visitor.visit_pattern(pattern, *optional),
      Source::Artifact {
        artifact,
        mode,
        platform,
      } => visitor.visit_artifact(artifact, *mode, *platform),
      Source::Depfile { name } => {
        visitor.visit_depfile(name);
        Ok(())
      }
    }
  }
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Source::Pattern { pattern, .. } => f.write_str(pattern),
      Source::Artifact { artifact, .. } => write!(f, "artifact:{}", artifact),
      Source::Depfile { name } => write!(f, "depfile:{}", name),
    }
  }
}
