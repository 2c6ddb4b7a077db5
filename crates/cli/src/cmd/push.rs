//! Implementation of the `kiln push` command.
//!
//! Uploads every regular file under a directory to a running device file
//! system, keyed by its path relative to that directory.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;
use walkdir::WalkDir;

use kiln_lib::devfs::{DevFsConfig, DevFsContent, DevFsWriter, HttpUploadTransport};

use crate::output::{format_bytes, format_duration, print_error, print_json, print_stat, print_success};

pub fn cmd_push(uri: &str, fs_name: &str, root: &Path, json: bool) -> Result<()> {
  if !root.is_dir() {
    bail!("Not a directory: {}", root.display());
  }

  let config = DevFsConfig::from_env();
  let batch = collect_files(root, &config)?;
  info!(root = ?root, files = batch.len(), "collected files");

  let writer = DevFsWriter::new(HttpUploadTransport::new(uri, fs_name), config);
  let started = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(writer.write(batch)).context("Upload failed")?;
  let elapsed = started.elapsed();

  if json {
    print_json(&serde_json::json!({
      "uploaded": report.uploaded,
      "abandoned": report.abandoned,
      "bytes": report.bytes,
    }))?;
  } else {
    print_success(&format!("Pushed {} file(s) to {}", report.uploaded.len(), fs_name));
    print_stat("Sent", &format_bytes(report.bytes));
    print_stat("Took", &format_duration(elapsed));
    for uri in &report.abandoned {
      print_error(&format!("Gave up on {}", uri));
    }
  }

  if !report.abandoned.is_empty() {
    bail!("{} file(s) could not be uploaded", report.abandoned.len());
  }
  Ok(())
}

fn collect_files(root: &Path, config: &DevFsConfig) -> Result<HashMap<String, DevFsContent>> {
  let mut batch = HashMap::new();
  for entry in WalkDir::new(root).follow_links(true) {
    let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let device_uri = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    batch.insert(device_uri, DevFsContent::file(entry.path(), config));
  }
  Ok(batch)
}
