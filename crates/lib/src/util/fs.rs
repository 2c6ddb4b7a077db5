//! Atomic persistence helpers.
//!
//! Stamps and the file hash cache are written to a temporary file in the same
//! directory and renamed over the destination, so an interrupted write leaves
//! the previous file in place.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

/// Serialize `value` as JSON and atomically replace `path` with it.
///
/// The parent directory must already exist.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"))?;

  let content = serde_json::to_vec(value).map_err(io::Error::other)?;

  let mut temp = NamedTempFile::new_in(parent)?;
  temp.write_all(&content)?;
  temp.flush()?;
  temp.persist(path).map_err(|e| e.error)?;

  Ok(())
}

/// Read and deserialize a JSON file.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
  let content = match std::fs::read(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e),
  };

  serde_json::from_slice(&content)
    .map(Some)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
