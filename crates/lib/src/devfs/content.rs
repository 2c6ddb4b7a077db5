//! Content to transfer to a device.
//!
//! Each variant answers "has this changed since I last asked" and can hand
//! out its bytes in full or as a lazy sequence of chunks, optionally gzipped.

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::Compression;
use flate2::read::GzEncoder;
use tracing::debug;

use super::types::DevFsConfig;
use crate::consts::CONTENT_CHUNK_SIZE;

#[derive(Debug, Clone)]
pub enum DevFsContent {
  File(FileContent),
  Bytes(ByteContent),
  String(StringContent),
}

impl DevFsContent {
  pub fn file(path: impl Into<PathBuf>, config: &DevFsConfig) -> Self {
    DevFsContent::File(FileContent::new(path, config))
  }

  pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
    DevFsContent::Bytes(ByteContent::new(bytes))
  }

  pub fn string(string: impl Into<String>) -> Self {
    DevFsContent::String(StringContent::new(string))
  }

  /// True if the content changed since the previous call.
  pub fn is_modified(&mut self) -> bool {
    match self {
      DevFsContent::File(file) => file.is_modified(),
      DevFsContent::Bytes(bytes) => bytes.is_modified(),
      DevFsContent::String(string) => string.is_modified(),
    }
  }

  /// True if the content changed after `time`.
  pub fn is_modified_after(&mut self, time: SystemTime) -> bool {
    match self {
      DevFsContent::File(file) => file.is_modified_after(time),
      DevFsContent::Bytes(bytes) => bytes.is_modified_after(time),
      DevFsContent::String(string) => string.is_modified_after(time),
    }
  }

  /// Length in bytes. A file that does not exist has size zero.
  pub fn size(&mut self) -> u64 {
    match self {
      DevFsContent::File(file) => file.size(),
      DevFsContent::Bytes(bytes) => bytes.bytes().len() as u64,
      DevFsContent::String(string) => string.bytes().len() as u64,
    }
  }

  pub fn contents_as_bytes(&self) -> io::Result<Vec<u8>> {
    match self {
      DevFsContent::File(file) => fs::read(file.path()),
      DevFsContent::Bytes(bytes) => Ok(bytes.bytes().to_vec()),
      DevFsContent::String(string) => Ok(string.bytes().to_vec()),
    }
  }

  /// The content as a lazy sequence of chunks.
  pub fn content_chunks(&self) -> io::Result<ContentChunks> {
    Ok(ContentChunks::new(self.reader()?))
  }

  /// The gzipped content as a lazy sequence of chunks. Compression happens
  /// as chunks are pulled.
  pub fn compressed_chunks(&self) -> io::Result<ContentChunks> {
    let encoder = GzEncoder::new(self.reader()?, Compression::default());
    Ok(ContentChunks::new(Box::new(encoder)))
  }

  /// The file this content is read from, for depfile generation.
  pub fn dependency(&self) -> Option<&Path> {
    match self {
      DevFsContent::File(file) => Some(file.path()),
      _ => None,
    }
  }

  fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
    match self {
      DevFsContent::File(file) => Ok(Box::new(fs::File::open(file.path())?)),
      DevFsContent::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.bytes().to_vec()))),
      DevFsContent::String(string) => Ok(Box::new(Cursor::new(string.bytes().to_vec()))),
    }
  }
}

/// Content backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileContent {
  path: PathBuf,
  cache_symlinks: bool,
  link_target: Option<PathBuf>,
  /// Modification time seen by the last stat; `None` if the file was absent
  /// or never looked at.
  last_modified: Option<SystemTime>,
}

impl FileContent {
  pub fn new(path: impl Into<PathBuf>, config: &DevFsConfig) -> Self {
    Self {
      path: path.into(),
      cache_symlinks: config.cache_symlinks,
      link_target: None,
      last_modified: None,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The cached target of a symlinked file, if any.
  pub fn link_target(&self) -> Option<&Path> {
    self.link_target.as_deref()
  }

  pub fn is_modified(&mut self) -> bool {
    let previous = self.last_modified;
    let current = self.stat().and_then(|meta| meta.modified().ok());
    self.last_modified = current;

    match (previous, current) {
      (None, None) => false,
      (Some(previous), Some(current)) => current > previous,
      _ => true,
    }
  }

  pub fn is_modified_after(&mut self, time: SystemTime) -> bool {
    let previous = self.last_modified;
    let current = self.stat().and_then(|meta| meta.modified().ok());
    self.last_modified = current;

    match (previous, current) {
      (None, None) => false,
      (_, None) => true,
      (_, Some(current)) => current > time,
    }
  }

  pub fn size(&mut self) -> u64 {
    self.stat().map(|meta| meta.len()).unwrap_or(0)
  }

  fn stat(&mut self) -> Option<fs::Metadata> {
    if let Some(target) = &self.link_target {
      match fs::metadata(target) {
        Ok(meta) => return Some(meta),
        Err(_) => {
          debug!(path = ?self.path, target = ?target, "cached link target is gone");
          self.link_target = None;
        }
      }
    }

    let meta = fs::symlink_metadata(&self.path).ok()?;
    if !meta.file_type().is_symlink() {
      return Some(meta);
    }

    let target = dunce::canonicalize(&self.path).ok()?;
    let meta = fs::metadata(&target).ok()?;
    if self.cache_symlinks {
      self.link_target = Some(target);
    }
    Some(meta)
  }
}

/// In-memory content with a one-shot modified flag.
#[derive(Debug, Clone)]
pub struct ByteContent {
  bytes: Vec<u8>,
  modified: bool,
  modification_time: SystemTime,
}

impl ByteContent {
  pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      bytes: bytes.into(),
      modified: true,
      modification_time: SystemTime::now(),
    }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn set_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
    self.bytes = bytes.into();
    self.modified = true;
    self.modification_time = SystemTime::now();
  }

  /// Reports a mutation once; the flag is cleared by reading it.
  pub fn is_modified(&mut self) -> bool {
    std::mem::replace(&mut self.modified, false)
  }

  pub fn is_modified_after(&self, time: SystemTime) -> bool {
    self.modification_time > time
  }

  pub fn modification_time(&self) -> SystemTime {
    self.modification_time
  }
}

/// Text content; the bytes are its UTF-8 encoding.
#[derive(Debug, Clone)]
pub struct StringContent {
  string: String,
  inner: ByteContent,
}

impl StringContent {
  pub fn new(string: impl Into<String>) -> Self {
    let string = string.into();
    let inner = ByteContent::new(string.as_bytes());
    Self { string, inner }
  }

  pub fn string(&self) -> &str {
    &self.string
  }

  pub fn bytes(&self) -> &[u8] {
    self.inner.bytes()
  }

  pub fn set_string(&mut self, string: impl Into<String>) {
    self.string = string.into();
    self.inner.set_bytes(self.string.as_bytes());
  }

  /// Replace the raw bytes. Invalid UTF-8 is replaced in the text view.
  pub fn set_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
    let bytes = bytes.into();
    self.string = String::from_utf8_lossy(&bytes).into_owned();
    self.inner.set_bytes(bytes);
  }

  pub fn is_modified(&mut self) -> bool {
    self.inner.is_modified()
  }

  pub fn is_modified_after(&self, time: SystemTime) -> bool {
    self.inner.is_modified_after(time)
  }
}

/// Lazy chunked reader over content bytes.
pub struct ContentChunks {
  reader: Box<dyn Read + Send>,
  chunk_size: usize,
  done: bool,
}

impl ContentChunks {
  fn new(reader: Box<dyn Read + Send>) -> Self {
    Self {
      reader,
      chunk_size: CONTENT_CHUNK_SIZE,
      done: false,
    }
  }

  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size.max(1);
    self
  }

  /// Read every remaining chunk into one buffer.
  pub fn collect_bytes(self) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for chunk in self {
      buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
  }
}

impl Iterator for ContentChunks {
  type Item = io::Result<Vec<u8>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let mut chunk = vec![0u8; self.chunk_size];
    let mut filled = 0;
    while filled < chunk.len() {
      match self.reader.read(&mut chunk[filled..]) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) => {
          self.done = true;
          return Some(Err(e));
        }
      }
    }

    if filled < chunk.len() {
      self.done = true;
    }
    if filled == 0 {
      return None;
    }
    chunk.truncate(filled);
    Some(Ok(chunk))
  }
}
