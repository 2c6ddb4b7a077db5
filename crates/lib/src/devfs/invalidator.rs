use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, info};

/// Finds project sources that changed since the last compile.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectFileInvalidator;

impl ProjectFileInvalidator {
  pub fn new() -> Self {
    Self
  }

  /// Paths modified after `last_compiled` or deleted since.
  ///
  /// With no previous compile nothing is invalidated: the first compile sees
  /// every source anyway. The result keeps the order of `paths`.
  pub fn find_invalidated(&self, last_compiled: Option<SystemTime>, paths: &[PathBuf]) -> Vec<PathBuf> {
    let Some(last_compiled) = last_compiled else {
      debug!("no previous compile, nothing to invalidate");
      return Vec::new();
    };

    let invalidated: Vec<PathBuf> = paths
      .par_iter()
      .filter(|path| match std::fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => modified > last_compiled,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
          debug!(path = ?path, error = %e, "unable to stat source, invalidating");
          true
        }
      })
      .cloned()
      .collect();

    info!(checked = paths.len(), invalidated = invalidated.len(), "scanned sources");
    invalidated
  }
}
