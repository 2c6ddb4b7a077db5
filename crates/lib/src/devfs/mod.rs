//! Device file system synchronization.
//!
//! A `DevFs` mirrors a project onto a file system hosted by a running
//! program. Each `update()` finds the sources changed since the last
//! compile, has the incremental compiler rebuild, and pushes the compiled
//! artifact plus any changed assets.
//!
//! # Submodules
//!
//! - [`content`] - Files, bytes and strings with change tracking
//! - [`writer`] - Bounded, retrying batch uploader
//! - [`transport`] - HTTP transport used by the uploader
//! - [`control`] - Control channel of the hosting runtime
//! - [`compiler`] - Incremental compiler and asset bundle seams
//! - [`invalidator`] - Dirty set detection

pub mod compiler;
pub mod content;
pub mod control;
pub mod invalidator;
pub mod transport;
mod types;
pub mod writer;

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use tracing::{debug, error, info};

pub use compiler::{AssetBundle, CompileRequest, CompilerOutput, IncrementalCompiler};
pub use content::DevFsContent;
pub use control::DevFsControl;
pub use invalidator::ProjectFileInvalidator;
pub use transport::HttpUploadTransport;
pub use types::*;
pub use writer::{DevFsWriter, UploadRequest, UploadTransport};

use crate::consts::{DEVICE_ASSET_DIR, INCREMENTAL_ARTIFACT_SUFFIX};

/// Inputs of one synchronization pass.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
  pub entry_point: PathBuf,
  pub package_config: PathBuf,
  /// Where the compiler writes its artifact.
  pub output_path: PathBuf,
  /// Sources checked for changes since the last compile.
  pub sources: Vec<PathBuf>,
  /// Send the artifact through the uploader instead of the control channel.
  pub full_restart: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
  /// False when compilation failed; nothing was synced in that case.
  pub success: bool,
  pub invalidated_sources: Vec<PathBuf>,
  pub synced_bytes: u64,
  /// Device paths written during this pass, sorted.
  pub uploaded: Vec<String>,
  /// Device paths given up on, sorted.
  pub abandoned: Vec<String>,
  /// The artifact produced by this pass, if the compiler ran.
  pub compiled: Option<PathBuf>,
}

pub struct DevFs<C> {
  control: C,
  name: String,
  root_dir: PathBuf,
  config: DevFsConfig,
  base_uri: Option<Url>,
  last_compiled: Option<SystemTime>,
  synced_paths: BTreeSet<String>,
  invalidator: ProjectFileInvalidator,
}

impl<C: DevFsControl> DevFs<C> {
  pub fn new(control: C, name: impl Into<String>, root_dir: impl Into<PathBuf>, config: DevFsConfig) -> Self {
    Self {
      control,
      name: name.into(),
      root_dir: root_dir.into(),
      config,
      base_uri: None,
      last_compiled: None,
      synced_paths: BTreeSet::new(),
      invalidator: ProjectFileInvalidator::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn base_uri(&self) -> Option<&Url> {
    self.base_uri.as_ref()
  }

  /// Start of the last successful compile.
  pub fn last_compiled(&self) -> Option<SystemTime> {
    self.last_compiled
  }

  /// Device paths known to be on the device.
  pub fn synced_paths(&self) -> &BTreeSet<String> {
    &self.synced_paths
  }

  /// Create the device file system, replacing a stale one of the same name.
  pub async fn create(&mut self) -> Result<Url, DevFsError> {
    let uri = match self.control.create_fs(&self.name).await {
      Ok(uri) => uri,
      Err(ControlError::AlreadyExists(_)) => {
        info!(name = %self.name, "device file system already exists, recreating");
        self.control.delete_fs(&self.name).await?;
        self.control.create_fs(&self.name).await?
      }
      Err(e) => return Err(e.into()),
    };

    info!(name = %self.name, uri = %uri, "created device file system");
    self.base_uri = Some(uri.clone());
    self.last_compiled = None;
    self.synced_paths.clear();
    Ok(uri)
  }

  pub async fn destroy(&mut self) -> Result<(), DevFsError> {
    self.control.delete_fs(&self.name).await?;
    info!(name = %self.name, "destroyed device file system");
    self.base_uri = None;
    self.synced_paths.clear();
    Ok(())
  }

  /// Uploader targeting this file system over HTTP.
  pub fn http_writer(&self) -> Result<DevFsWriter<HttpUploadTransport>, DevFsError> {
    let uri = self.base_uri.as_ref().ok_or(DevFsError::NotCreated)?;
    Ok(DevFsWriter::new(
      HttpUploadTransport::new(uri.as_str(), &self.name),
      self.config,
    ))
  }

  /// Synchronize the device with the project.
  ///
  /// The compiler runs on the first pass, on a full restart, and whenever a
  /// source changed. A compile failure yields an unsuccessful report and
  /// syncs nothing.
  pub async fn update<K, B, T>(
    &mut self,
    request: UpdateRequest,
    compiler: &K,
    bundle: &mut B,
    writer: &DevFsWriter<T>,
  ) -> Result<UpdateReport, DevFsError>
  where
    K: IncrementalCompiler,
    B: AssetBundle,
    T: UploadTransport,
  {
    if self.base_uri.is_none() {
      return Err(DevFsError::NotCreated);
    }

    let mut report = UpdateReport::default();
    let invalidated = self.invalidator.find_invalidated(self.last_compiled, &request.sources);

    let mut artifact = None;
    if self.last_compiled.is_none() || request.full_restart || !invalidated.is_empty() {
      let started = SystemTime::now();
      info!(invalidated = invalidated.len(), full_restart = request.full_restart, "recompiling");

      let compiled = compiler
        .recompile(CompileRequest {
          entry_point: request.entry_point.clone(),
          invalidated: invalidated.clone(),
          output_path: request.output_path.clone(),
          package_config: request.package_config.clone(),
        })
        .await;

      report.invalidated_sources = invalidated;
      match compiled {
        Ok(output) if output.error_count == 0 => {
          self.last_compiled = Some(started);
          artifact = Some(output.output_path);
        }
        Ok(output) => {
          error!(errors = output.error_count, "compilation reported errors");
          return Ok(report);
        }
        Err(e) => {
          error!(error = %e, "compilation failed");
          return Ok(report);
        }
      }
    }

    let mut batch = HashMap::new();
    for (path, content) in bundle.entries().iter_mut() {
      let device_path = format!("{DEVICE_ASSET_DIR}/{path}");
      if content.is_modified() || !self.synced_paths.contains(&device_path) {
        batch.insert(device_path, content.clone());
      }
    }

    if let Some(artifact) = &artifact {
      let device_path = format!("{}{INCREMENTAL_ARTIFACT_SUFFIX}", self.device_path(&request.entry_point));
      if request.full_restart {
        batch.insert(device_path, DevFsContent::file(artifact, &self.config));
      } else {
        let bytes = tokio::fs::read(artifact).await.map_err(|source| DevFsError::Io {
          path: artifact.clone(),
          source,
        })?;
        self
          .control
          .write_file(&self.name, &device_path, &STANDARD.encode(&bytes))
          .await?;
        report.synced_bytes += bytes.len() as u64;
        self.synced_paths.insert(device_path.clone());
        report.uploaded.push(device_path);
      }
    }
    report.compiled = artifact;

    if !batch.is_empty() {
      // Change flags were consumed while collecting, so anything that does
      // not reach the device must be forgotten to be sent again next pass.
      let batch_paths: Vec<String> = batch.keys().cloned().collect();
      let uploaded = match writer.write(batch).await {
        Ok(uploaded) => uploaded,
        Err(e) => {
          self.forget(&batch_paths);
          return Err(e.into());
        }
      };
      self.forget(&uploaded.abandoned);
      report.synced_bytes += uploaded.bytes;
      self.synced_paths.extend(uploaded.uploaded.iter().cloned());
      report.uploaded.extend(uploaded.uploaded);
      report.abandoned = uploaded.abandoned;
    }

    report.uploaded.sort_unstable();
    report.success = true;
    info!(
      uploaded = report.uploaded.len(),
      abandoned = report.abandoned.len(),
      bytes = report.synced_bytes,
      "device file system updated"
    );
    Ok(report)
  }

  /// Drop `paths` from the synced set. A lost artifact also drops the last
  /// compile, so the next pass recompiles and sends it again.
  fn forget(&mut self, paths: &[String]) {
    for path in paths {
      if path.ends_with(INCREMENTAL_ARTIFACT_SUFFIX) {
        self.last_compiled = None;
      }
      if self.synced_paths.remove(path) {
        debug!(path = %path, "no longer known to be on the device");
      }
    }
  }

  /// `/`-separated path of `path` relative to the project root.
  fn device_path(&self, path: &Path) -> String {
    let relative = path.strip_prefix(&self.root_dir).unwrap_or(path);
    relative
      .components()
      .filter_map(|component| match component {
        Component::Normal(part) => Some(part.to_string_lossy()),
        _ => None,
      })
      .collect::<Vec<_>>()
      .join("/")
  }
}
