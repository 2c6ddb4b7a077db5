//! Implementation of the `kiln hash` command.
//!
//! Loads the file cache of a build directory, hashes the given files, reports
//! which ones changed since the cache was written, and persists the new hashes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use kiln_lib::filestore::{CacheOutcome, FileHashStore, HashStrategy};

use crate::output::{print_info, print_json, print_stat, print_success, print_warning, symbols, truncate_hash};

pub fn cmd_hash(build_dir: &Path, files: &[PathBuf], timestamp: bool, json: bool) -> Result<()> {
  let strategy = if timestamp {
    HashStrategy::Timestamp
  } else {
    HashStrategy::Content
  };

  let mut store = FileHashStore::new(build_dir, strategy);
  let loaded = store.initialize();
  debug!(outcome = ?loaded, "file cache initialized");

  let changed = store.diff_files(files);
  let persisted = store.persist();

  if json {
    let entries: Vec<_> = files
      .iter()
      .map(|file| {
        serde_json::json!({
          "path": file.display().to_string(),
          "hash": store.current_hash(file),
          "changed": changed.contains(file),
        })
      })
      .collect();
    return print_json(&serde_json::json!({ "files": entries, "changed": changed.len() }));
  }

  if let CacheOutcome::Discarded(reason) = &loaded {
    print_warning(&format!("Ignored existing file cache: {}", reason));
  }

  if changed.is_empty() {
    print_success(&format!("{} file(s) unchanged", files.len()));
  } else {
    print_info(&format!("{} of {} file(s) changed", changed.len(), files.len()));
  }

  for file in files {
    let marker = if changed.contains(file) {
      symbols::MODIFY
    } else {
      " "
    };
    let hash = store.current_hash(file).map(truncate_hash).unwrap_or("unreadable");
    println!("  {} {} {}", marker, hash, file.display());
  }

  println!();
  match persisted {
    CacheOutcome::Persisted(count) => print_stat("Cached", &count.to_string()),
    CacheOutcome::Skipped => print_stat("Cached", "skipped (build directory missing)"),
    CacheOutcome::Failed(reason) => print_warning(&format!("Failed to write file cache: {}", reason)),
    other => debug!(outcome = ?other, "unexpected persist outcome"),
  }

  Ok(())
}
