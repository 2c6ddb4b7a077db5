use std::future::Future;

use reqwest::Url;

use super::types::ControlError;

/// Control channel of the runtime hosting the device file system.
///
/// The wire encoding belongs to the runtime; implementations only map these
/// calls onto it.
pub trait DevFsControl: Send + Sync {
  /// Create the file system `name` and return the base URI uploads go to.
  ///
  /// Fails with `ControlError::AlreadyExists` if a file system of that name
  /// is still around from an earlier session.
  fn create_fs(&self, name: &str) -> impl Future<Output = Result<Url, ControlError>> + Send;

  fn delete_fs(&self, name: &str) -> impl Future<Output = Result<(), ControlError>> + Send;

  /// Write one file inline. `contents` is base64-encoded.
  fn write_file(&self, fs_name: &str, path: &str, contents: &str) -> impl Future<Output = Result<(), ControlError>> + Send;
}
