use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::consts::{MAX_CONCURRENT_UPLOADS, MAX_UPLOAD_RETRIES};

const CACHE_SYMLINKS_VAR: &str = "KILN_CACHE_SYMLINKS";
const UPLOAD_CONCURRENCY_VAR: &str = "KILN_UPLOAD_CONCURRENCY";
const UPLOAD_RETRIES_VAR: &str = "KILN_UPLOAD_RETRIES";

/// Settings for device synchronization, passed to each component at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevFsConfig {
  /// Remember where a symlinked file points instead of resolving it on every stat.
  pub cache_symlinks: bool,
  /// Upper bound on uploads in flight.
  pub max_concurrent_uploads: usize,
  /// Extra attempts for an upload that failed with a request error.
  pub max_retries: usize,
  /// Gzip upload bodies.
  pub compress_uploads: bool,
}

impl Default for DevFsConfig {
  fn default() -> Self {
    Self {
      cache_symlinks: false,
      max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
      max_retries: MAX_UPLOAD_RETRIES,
      compress_uploads: true,
    }
  }
}

impl DevFsConfig {
  /// Defaults overlaid with `KILN_CACHE_SYMLINKS`, `KILN_UPLOAD_CONCURRENCY`
  /// and `KILN_UPLOAD_RETRIES`. Unparsable values are ignored.
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Some(value) = env_value::<bool>(CACHE_SYMLINKS_VAR) {
      config.cache_symlinks = value;
    }
    if let Some(value) = env_value::<usize>(UPLOAD_CONCURRENCY_VAR).filter(|n| *n > 0) {
      config.max_concurrent_uploads = value;
    }
    if let Some(value) = env_value::<usize>(UPLOAD_RETRIES_VAR) {
      config.max_retries = value;
    }
    config
  }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
  let raw = std::env::var(name).ok()?;
  match raw.trim().parse() {
    Ok(value) => Some(value),
    Err(_) => {
      warn!(var = name, value = %raw, "ignoring invalid environment value");
      None
    }
  }
}

/// Failure of a single upload request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
  /// The connection to the device is gone; the whole batch is lost.
  #[error("connection to device failed: {0}")]
  Fatal(String),

  /// This request failed; it may be retried.
  #[error("upload request failed: {0}")]
  Request(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
  #[error("upload of {uri} failed: {source}")]
  Fatal {
    uri: String,
    #[source]
    source: TransportError,
  },

  #[error("upload task failed: {0}")]
  Task(String),
}

/// Errors from the device's control channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
  #[error("file system {0} already exists")]
  AlreadyExists(String),

  #[error("file system {0} does not exist")]
  NotFound(String),

  #[error("control request failed: {0}")]
  Request(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
  #[error("compilation failed: {0}")]
  Failed(String),

  #[error("compiler is not available: {0}")]
  Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DevFsError {
  #[error("device file system has not been created")]
  NotCreated,

  #[error(transparent)]
  Control(#[from] ControlError),

  #[error(transparent)]
  Upload(#[from] UploadError),

  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Outcome of a completed upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
  /// Device URIs written, sorted.
  pub uploaded: Vec<String>,
  /// Device URIs given up on after exhausting retries or failing to read, sorted.
  pub abandoned: Vec<String>,
  /// Body bytes sent for the uploaded entries.
  pub bytes: u64,
}
