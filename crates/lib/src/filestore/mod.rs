//! Persistent file hash cache.
//!
//! The store keeps two generations of hashes for one build directory:
//! - `previous_hashes`: the snapshot loaded from `.filecache` by `initialize()`
//! - `current_hashes`: hashes computed during this run
//!
//! Every failure in this layer is recovered from. A lost or unreadable cache
//! only costs incrementality, so operations report a `CacheOutcome` and log
//! instead of returning errors.
//!
//! # Storage Layout
//!
//! ```text
//! {build_dir}/.filecache   # {"version": N, "files": [{"path", "hash"}]}
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::consts::{FILE_CACHE_NAME, FILE_CACHE_VERSION};
use crate::util::fs::{read_json, write_json_atomic};
use crate::util::hash::hash_file;

/// How a file's "hash" is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
  /// SHA-256 of the full file contents.
  #[default]
  Content,
  /// Last modification time. Cheaper, but touching a file invalidates it.
  Timestamp,
}

/// What a cache operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
  /// A snapshot with this many entries was loaded.
  Loaded(usize),
  /// No cache file existed.
  Empty,
  /// The cache file was unusable and has been ignored.
  Discarded(String),
  /// This many entries were written.
  Persisted(usize),
  /// Nothing was written because the build directory does not exist.
  Skipped,
  /// Writing failed; the previous cache file is left in place.
  Failed(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct FileStorage {
  version: u32,
  files: Vec<FileHash>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileHash {
  path: String,
  hash: String,
}

/// Content hash cache scoped to one build directory.
#[derive(Debug)]
pub struct FileHashStore {
  build_dir: PathBuf,
  strategy: HashStrategy,
  previous_hashes: HashMap<PathBuf, String>,
  current_hashes: HashMap<PathBuf, String>,
}

impl FileHashStore {
  pub fn new(build_dir: impl Into<PathBuf>, strategy: HashStrategy) -> Self {
    Self {
      build_dir: build_dir.into(),
      strategy,
      previous_hashes: HashMap::new(),
      current_hashes: HashMap::new(),
    }
  }

  pub fn cache_path(&self) -> PathBuf {
    self.build_dir.join(FILE_CACHE_NAME)
  }

  pub fn strategy(&self) -> HashStrategy {
    self.strategy
  }

  /// Load the persisted snapshot into `previous_hashes`.
  ///
  /// Clears both generations first. A cache written with another schema
  /// version, or one that cannot be read or parsed, is discarded.
  pub fn initialize(&mut self) -> CacheOutcome {
    self.previous_hashes.clear();
    self.current_hashes.clear();

    let path = self.cache_path();
    let storage: FileStorage = match read_json(&path) {
      Ok(Some(storage)) => storage,
      Ok(None) => {
        debug!(path = ?path, "no file cache found");
        return CacheOutcome::Empty;
      }
      Err(e) => {
        warn!(path = ?path, error = %e, "file cache is corrupt, discarding");
        return CacheOutcome::Discarded(e.to_string());
      }
    };

    if storage.version != FILE_CACHE_VERSION {
      warn!(
        path = ?path,
        found = storage.version,
        expected = FILE_CACHE_VERSION,
        "file cache version mismatch, discarding"
      );
      return CacheOutcome::Discarded(format!("unsupported version {}", storage.version));
    }

    self.previous_hashes = storage
      .files
      .into_iter()
      .map(|entry| (PathBuf::from(entry.path), entry.hash))
      .collect();

    debug!(entries = self.previous_hashes.len(), "loaded file cache");
    CacheOutcome::Loaded(self.previous_hashes.len())
  }

  /// Hash `files` and record the results in `current_hashes`.
  ///
  /// Files are hashed in parallel and merged afterwards. A file that cannot
  /// be read gets no hash but is still part of the returned list, so the
  /// caller can decide what a missing hash means.
  pub fn hash_files(&mut self, files: &[PathBuf]) -> Vec<PathBuf> {
    let strategy = self.strategy;
    let results: Vec<(PathBuf, io::Result<String>)> = files
      .par_iter()
      .map(|file| (file.clone(), compute_hash(strategy, file)))
      .collect();

    let mut hashed = Vec::with_capacity(results.len());
    for (file, result) in results {
      match result {
        Ok(hash) => {
          self.current_hashes.insert(file.clone(), hash);
        }
        Err(e) => debug!(path = ?file, error = %e, "unable to hash file"),
      }
      hashed.push(file);
    }
    hashed
  }

  /// Hash `files` and return those that differ from the previous snapshot.
  ///
  /// A file with no previous hash, or one that could not be hashed now,
  /// counts as changed.
  pub fn diff_files(&mut self, files: &[PathBuf]) -> Vec<PathBuf> {
    self
      .hash_files(files)
      .into_iter()
      .filter(|file| match (self.previous_hashes.get(file), self.current_hashes.get(file)) {
        (Some(previous), Some(current)) => previous != current,
        _ => true,
      })
      .collect()
  }

  pub fn current_hash(&self, path: &Path) -> Option<&str> {
    self.current_hashes.get(path).map(String::as_str)
  }

  pub fn previous_hash(&self, path: &Path) -> Option<&str> {
    self.previous_hashes.get(path).map(String::as_str)
  }

  pub fn current_hashes(&self) -> &HashMap<PathBuf, String> {
    &self.current_hashes
  }

  pub fn previous_hashes(&self) -> &HashMap<PathBuf, String> {
    &self.previous_hashes
  }

  /// Write the cache back to disk.
  ///
  /// When nothing was hashed this run, the previous snapshot is written
  /// again so a no-op run does not empty the cache.
  pub fn persist(&self) -> CacheOutcome {
    if !self.build_dir.is_dir() {
      debug!(dir = ?self.build_dir, "build directory missing, not persisting file cache");
      return CacheOutcome::Skipped;
    }

    let source = if self.current_hashes.is_empty() {
      &self.previous_hashes
    } else {
      &self.current_hashes
    };

    let mut files: Vec<FileHash> = source
      .iter()
      .map(|(path, hash)| FileHash {
        path: path.to_string_lossy().into_owned(),
        hash: hash.clone(),
      })
      .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let count = files.len();
    let storage = FileStorage {
      version: FILE_CACHE_VERSION,
      files,
    };

    match write_json_atomic(&self.cache_path(), &storage) {
      Ok(()) => {
        info!(entries = count, "persisted file cache");
        CacheOutcome::Persisted(count)
      }
      Err(e) => {
        error!(path = ?self.cache_path(), error = %e, "failed to persist file cache");
        CacheOutcome::Failed(e.to_string())
      }
    }
  }
}

fn compute_hash(strategy: HashStrategy, path: &Path) -> io::Result<String> {
  match strategy {
    HashStrategy::Content => hash_file(path).map(|hash| hash.0),
    HashStrategy::Timestamp => {
      let modified = std::fs::metadata(path)?.modified()?;
      let nanos = modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
      Ok(format!("mtime:{}", nanos))
    }
  }
}
