//! HTTP upload transport.
//!
//! Each entry is one `PUT` to the device file system's base URI. The
//! destination is carried in headers rather than the request path so device
//! URIs never need URL escaping.

use std::io;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::types::TransportError;
use super::writer::{UploadRequest, UploadTransport};
use crate::consts::{DEV_FS_NAME_HEADER, DEV_FS_URI_HEADER};

#[derive(Debug, Clone)]
pub struct HttpUploadTransport {
  client: reqwest::Client,
  base_uri: String,
  fs_name: String,
}

impl HttpUploadTransport {
  pub fn new(base_uri: impl Into<String>, fs_name: impl Into<String>) -> Self {
    Self::with_client(reqwest::Client::new(), base_uri, fs_name)
  }

  pub fn with_client(client: reqwest::Client, base_uri: impl Into<String>, fs_name: impl Into<String>) -> Self {
    Self {
      client,
      base_uri: base_uri.into(),
      fs_name: fs_name.into(),
    }
  }

  pub fn base_uri(&self) -> &str {
    &self.base_uri
  }

  pub fn fs_name(&self) -> &str {
    &self.fs_name
  }
}

impl UploadTransport for HttpUploadTransport {
  async fn put(&self, request: &UploadRequest) -> Result<(), TransportError> {
    debug!(uri = %request.device_uri, size = request.body.len(), "PUT");

    let response = self
      .client
      .put(&self.base_uri)
      .header(DEV_FS_NAME_HEADER, &self.fs_name)
      .header(DEV_FS_URI_HEADER, STANDARD.encode(request.device_uri.as_bytes()))
      .body(request.body.clone())
      .send()
      .await
      .map_err(classify)?;

    if !response.status().is_success() {
      return Err(TransportError::Request(format!("HTTP {}", response.status())));
    }
    Ok(())
  }
}

/// Connection failures lose the whole device session; anything else is
/// specific to the request.
fn classify(e: reqwest::Error) -> TransportError {
  if e.is_connect() || is_connection_lost(&e) {
    TransportError::Fatal(e.to_string())
  } else {
    TransportError::Request(e.to_string())
  }
}

/// Whether the peer reset or closed the connection mid-request.
fn is_connection_lost(e: &reqwest::Error) -> bool {
  let mut source = std::error::Error::source(e);
  while let Some(err) = source {
    let lost = match (err.downcast_ref::<io::Error>(), err.downcast_ref::<hyper::Error>()) {
      (Some(io), _) => matches!(
        io.kind(),
        io::ErrorKind::ConnectionReset
          | io::ErrorKind::ConnectionAborted
          | io::ErrorKind::BrokenPipe
          | io::ErrorKind::UnexpectedEof
      ),
      (_, Some(hyper)) => hyper.is_incomplete_message() || hyper.is_closed(),
      _ => false,
    };
    if lost {
      return true;
    }
    source = err.source();
  }
  false
}
