//! Bounded, retrying uploader.
//!
//! `DevFsWriter::write` drains a batch of device URI to content with at most
//! `max_concurrent_uploads` requests in flight. A request error is retried in
//! the same slot; a fatal transport error ends the batch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::content::DevFsContent;
use super::types::{DevFsConfig, TransportError, UploadError, UploadReport};

/// One upload: the body is already read and, if configured, gzipped.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub device_uri: String,
  pub body: Vec<u8>,
  pub compressed: bool,
}

/// Moves one request to the device.
pub trait UploadTransport: Send + Sync + 'static {
  fn put(&self, request: &UploadRequest) -> impl Future<Output = Result<(), TransportError>> + Send;
}

pub struct DevFsWriter<T> {
  transport: Arc<T>,
  config: DevFsConfig,
}

enum EntryOutcome {
  Uploaded { uri: String, bytes: u64 },
  Abandoned { uri: String },
  Fatal { uri: String, error: TransportError },
}

impl<T: UploadTransport> DevFsWriter<T> {
  pub fn new(transport: T, config: DevFsConfig) -> Self {
    Self {
      transport: Arc::new(transport),
      config,
    }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn config(&self) -> &DevFsConfig {
    &self.config
  }

  /// Upload every entry of `batch`.
  ///
  /// Resolves once every entry was uploaded or abandoned. The first fatal
  /// transport error is returned and the uploads still in flight are aborted.
  pub async fn write(&self, batch: HashMap<String, DevFsContent>) -> Result<UploadReport, UploadError> {
    let limit = self.config.max_concurrent_uploads.max(1);
    let total = batch.len();
    let mut pending = batch.into_iter();
    let mut in_flight = JoinSet::new();
    let mut report = UploadReport::default();

    info!(entries = total, limit, "uploading batch");

    loop {
      while in_flight.len() < limit {
        let Some((uri, content)) = pending.next() else {
          break;
        };
        in_flight.spawn(upload_entry(
          Arc::clone(&self.transport),
          uri,
          content,
          self.config.compress_uploads,
          self.config.max_retries,
        ));
      }

      let Some(joined) = in_flight.join_next().await else {
        break;
      };

      match joined {
        Ok(EntryOutcome::Uploaded { uri, bytes }) => {
          report.bytes += bytes;
          report.uploaded.push(uri);
        }
        Ok(EntryOutcome::Abandoned { uri }) => report.abandoned.push(uri),
        Ok(EntryOutcome::Fatal { uri, error }) => {
          in_flight.abort_all();
          error!(uri = %uri, error = %error, "upload batch aborted");
          return Err(UploadError::Fatal { uri, source: error });
        }
        Err(e) => {
          in_flight.abort_all();
          error!(error = %e, "upload task panicked");
          return Err(UploadError::Task(e.to_string()));
        }
      }
    }

    report.uploaded.sort_unstable();
    report.abandoned.sort_unstable();
    info!(
      uploaded = report.uploaded.len(),
      abandoned = report.abandoned.len(),
      bytes = report.bytes,
      "upload batch complete"
    );
    Ok(report)
  }
}

async fn upload_entry<T: UploadTransport>(
  transport: Arc<T>,
  uri: String,
  content: DevFsContent,
  compress: bool,
  max_retries: usize,
) -> EntryOutcome {
  let body = tokio::task::spawn_blocking(move || {
    if compress {
      content.compressed_chunks()?.collect_bytes()
    } else {
      content.contents_as_bytes()
    }
  })
  .await;

  let body = match body {
    Ok(Ok(body)) => body,
    Ok(Err(e)) => {
      error!(uri = %uri, error = %e, "unable to read content, abandoning upload");
      return EntryOutcome::Abandoned { uri };
    }
    Err(e) => {
      error!(uri = %uri, error = %e, "content reader panicked, abandoning upload");
      return EntryOutcome::Abandoned { uri };
    }
  };

  let request = UploadRequest {
    device_uri: uri,
    body,
    compressed: compress,
  };

  let mut attempt = 0;
  loop {
    match transport.put(&request).await {
      Ok(()) => {
        debug!(uri = %request.device_uri, attempt, "uploaded");
        return EntryOutcome::Uploaded {
          bytes: request.body.len() as u64,
          uri: request.device_uri,
        };
      }
      Err(error @ TransportError::Fatal(_)) => {
        return EntryOutcome::Fatal {
          uri: request.device_uri,
          error,
        };
      }
      Err(e) if attempt < max_retries => {
        attempt += 1;
        debug!(uri = %request.device_uri, attempt, error = %e, "retrying upload");
      }
      Err(e) => {
        error!(
          uri = %request.device_uri,
          attempts = attempt + 1,
          error = %e,
          "upload failed, abandoning entry"
        );
        return EntryOutcome::Abandoned {
          uri: request.device_uri,
        };
      }
    }
  }
}
