//! Resolution of `Source` values into concrete files.
//!
//! A `SourceVisitor` walks a target's sources in order and accumulates the
//! files they denote. Resolution reads the filesystem but never writes to it,
//! so it can be repeated freely within one build.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::environment::{BuildMode, Environment, TargetPlatform};

use super::{Depfile, DepfileError, Root, Source};

/// Which side of a target's sources is being resolved.
///
/// Depfiles contribute their right-hand side when resolving inputs and their
/// left-hand side when resolving outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
  Inputs,
  Outputs,
}

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("invalid pattern {pattern}: {reason}")]
  InvalidPattern { pattern: String, reason: String },

  #[error("{pattern} does not match any file (looked for {})", path.display())]
  Missing { pattern: String, path: PathBuf },

  #[error("artifact {artifact} is not available")]
  ArtifactNotFound { artifact: String },

  #[error("failed to list {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ResolveError {
  /// True for errors caused by absent files rather than a bad declaration.
  pub fn is_missing(&self) -> bool {
    matches!(self, ResolveError::Missing { .. } | ResolveError::ArtifactNotFound { .. })
  }
}

/// Files resolved from a list of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
  pub files: Vec<PathBuf>,
  /// A referenced depfile does not exist yet.
  pub contains_new_depfile: bool,
}

/// Accumulates the concrete files denoted by visited sources.
pub struct SourceVisitor<'a> {
  environment: &'a Environment,
  role: SourceRole,
  sources: Vec<PathBuf>,
  contains_new_depfile: bool,
}

impl<'a> SourceVisitor<'a> {
  pub fn new(environment: &'a Environment, role: SourceRole) -> Self {
    Self {
      environment,
      role,
      sources: Vec::new(),
      contains_new_depfile: false,
    }
  }

  pub fn role(&self) -> SourceRole {
    self.role
  }

  pub fn sources(&self) -> &[PathBuf] {
    &self.sources
  }

  pub fn contains_new_depfile(&self) -> bool {
    self.contains_new_depfile
  }

  pub fn finish(self) -> Resolved {
    Resolved {
      files: self.sources,
      contains_new_depfile: self.contains_new_depfile,
    }
  }

  pub fn visit(&mut self, source: &Source) -> Result<(), ResolveError> {
    source.accept(self)
  }

  /// Resolve `{ROOT}/path` with at most one `*` in the final segment.
  pub fn visit_pattern(&mut self, pattern: &str, optional: bool) -> Result<(), ResolveError> {
    let parsed = ParsedPattern::parse(pattern)?;
    let dir = self.environment.root_dir(parsed.root).join(&parsed.dir);
    let dir = std::path::absolute(&dir).map_err(|source| ResolveError::Io {
      path: dir.clone(),
      source,
    })?;

    let Some((prefix, suffix)) = parsed.wildcard else {
      let file = dir.join(&parsed.file);
      if file.is_file() {
        self.sources.push(file);
        return Ok(());
      }
      if optional {
        debug!(pattern, "optional source is absent");
        return Ok(());
      }
      return Err(ResolveError::Missing {
        pattern: pattern.to_string(),
        path: file,
      });
    };

    let mut matched = match fs::read_dir(&dir) {
      Ok(entries) => entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
          path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| wildcard_matches(name, prefix, suffix))
        })
        .collect::<Vec<_>>(),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
      Err(source) => return Err(ResolveError::Io { path: dir, source }),
    };

    if matched.is_empty() && !optional {
      return Err(ResolveError::Missing {
        pattern: pattern.to_string(),
        path: dir.join(&parsed.file),
      });
    }

    matched.sort();
    self.sources.extend(matched);
    Ok(())
  }

  /// Resolve an artifact through the environment's locator.
  pub fn visit_artifact(
    &mut self,
    artifact: &str,
    mode: Option<BuildMode>,
    platform: Option<TargetPlatform>,
  ) -> Result<(), ResolveError> {
    let path = self
      .environment
      .artifacts
      .artifact_path(artifact, mode, platform)
      .ok_or_else(|| ResolveError::ArtifactNotFound {
        artifact: artifact.to_string(),
      })?;

    if path.is_dir() {
      let mut files = Vec::new();
      for entry in WalkDir::new(&path).sort_by_file_name() {
        let entry = entry.map_err(|e| ResolveError::Io {
          path: path.clone(),
          source: e.into(),
        })?;
        if entry.file_type().is_file() {
          files.push(entry.into_path());
        }
      }
      self.sources.extend(files);
      return Ok(());
    }

    if !path.exists() {
      return Err(ResolveError::Missing {
        pattern: format!("artifact:{}", artifact),
        path,
      });
    }

    self.sources.push(path);
    Ok(())
  }

  /// Collect one side of the depfile at `BUILD_DIR/<name>`.
  ///
  /// A depfile that does not exist yet contributes nothing and marks the
  /// resolution as containing a new depfile; a malformed one contributes
  /// nothing.
  pub fn visit_depfile(&mut self, name: &str) {
    let path = self.environment.build_dir.join(name);

    let depfile = match Depfile::parse(&path) {
      Ok(depfile) => depfile,
      Err(DepfileError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
        debug!(path = ?path, "depfile does not exist yet");
        self.contains_new_depfile = true;
        return;
      }
      Err(e) => {
        warn!(error = %e, "ignoring depfile");
        return;
      }
    };

    match self.role {
      SourceRole::Inputs => self.sources.extend(depfile.inputs),
      SourceRole::Outputs => self.sources.extend(depfile.outputs),
    }
  }
}

/// Resolve every source, failing on the first error.
pub fn resolve(environment: &Environment, role: SourceRole, sources: &[Source]) -> Result<Resolved, ResolveError> {
  let mut visitor = SourceVisitor::new(environment, role);
  for source in sources {
    visitor.visit(source)?;
  }
  Ok(visitor.finish())
}

/// Resolve every source, skipping the ones whose files are absent.
///
/// Declaration errors such as invalid patterns are still reported.
pub fn resolve_lenient(
  environment: &Environment,
  role: SourceRole,
  sources: &[Source],
) -> Result<Resolved, ResolveError> {
  let mut visitor = SourceVisitor::new(environment, role);
  for source in sources {
    match visitor.visit(source) {
      Err(e) if e.is_missing() => debug!(source = %source, "skipping absent source"),
      other => other?,
    }
  }
  Ok(visitor.finish())
}

struct ParsedPattern<'p> {
  root: Root,
  dir: PathBuf,
  file: &'p str,
  wildcard: Option<(&'p str, &'p str)>,
}

impl<'p> ParsedPattern<'p> {
  fn parse(pattern: &'p str) -> Result<Self, ResolveError> {
    let invalid = |reason: &str| ResolveError::InvalidPattern {
      pattern: pattern.to_string(),
      reason: reason.to_string(),
    };

    if pattern.matches('*').count() > 1 {
      return Err(invalid("only a single wildcard is supported"));
    }

    let mut segments: Vec<&str> = pattern.split('/').collect();
    let root = Root::from_token(segments[0])
      .ok_or_else(|| invalid("must start with a root token such as {PROJECT_DIR}"))?;

    let file = match segments.pop() {
      Some(file) if !segments.is_empty() && !file.is_empty() => file,
      _ => return Err(invalid("must name a file below the root")),
    };

    let mut dir = PathBuf::new();
    for segment in &segments[1..] {
      if segment.contains('*') {
        return Err(invalid("wildcards are only supported in the final segment"));
      }
      dir.push(segment);
    }

    Ok(Self {
      root,
      dir,
      file,
      wildcard: file.split_once('*'),
    })
  }
}

fn wildcard_matches(name: &str, prefix: &str, suffix: &str) -> bool {
  name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name[prefix.len()..].ends_with(suffix)
}
