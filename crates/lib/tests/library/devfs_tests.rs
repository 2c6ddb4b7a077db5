use std::collections::HashMap;
use std::io::Read;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use kiln_lib::devfs::{
  DevFsConfig, DevFsContent, DevFsWriter, HttpUploadTransport, TransportError, UploadError, UploadRequest,
  UploadTransport,
};
use mockito::{Matcher, Server};

/// Transport with scripted failures that tracks how many requests overlap.
#[derive(Default)]
struct ScriptedTransport {
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
  attempts: Mutex<HashMap<String, usize>>,
  /// Request errors before an entry succeeds.
  transient: HashMap<String, usize>,
  socket_failure: Option<String>,
}

impl ScriptedTransport {
  fn attempts(&self, uri: &str) -> usize {
    self.attempts.lock().unwrap().get(uri).copied().unwrap_or(0)
  }
}

impl UploadTransport for ScriptedTransport {
  async fn put(&self, request: &UploadRequest) -> Result<(), TransportError> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2)).await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let attempt = {
      let mut attempts = self.attempts.lock().unwrap();
      let count = attempts.entry(request.device_uri.clone()).or_default();
      *count += 1;
      *count
    };

    if self.socket_failure.as_deref() == Some(request.device_uri.as_str()) {
      return Err(TransportError::Fatal("socket closed".to_string()));
    }
    match self.transient.get(&request.device_uri) {
      Some(&failures) if attempt <= failures => Err(TransportError::Request("503".to_string())),
      _ => Ok(()),
    }
  }
}

fn batch(count: usize) -> HashMap<String, DevFsContent> {
  (0..count)
    .map(|i| (format!("assets/{i:02}.bin"), DevFsContent::bytes(vec![i as u8; 32])))
    .collect()
}

#[test]
fn byte_content_reports_each_mutation_once() {
  let mut content = DevFsContent::bytes(b"one".to_vec());
  assert!(content.is_modified());
  assert!(!content.is_modified());
  assert!(!content.is_modified());

  if let DevFsContent::Bytes(bytes) = &mut content {
    bytes.set_bytes(b"two".to_vec());
  }
  assert!(content.is_modified());
  assert!(!content.is_modified());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_more_than_six_in_flight() {
  let writer = DevFsWriter::new(ScriptedTransport::default(), DevFsConfig::default());

  let report = writer.write(batch(50)).await.unwrap();

  assert_eq!(report.uploaded.len(), 50);
  let max = writer.transport().max_in_flight.load(Ordering::SeqCst);
  assert!((1..=6).contains(&max), "max in flight was {max}");
}

#[tokio::test]
async fn transient_errors_succeed_within_three_retries() {
  let transport = ScriptedTransport {
    transient: HashMap::from([
      ("assets/00.bin".to_string(), 1),
      ("assets/01.bin".to_string(), 2),
      ("assets/02.bin".to_string(), 3),
    ]),
    ..ScriptedTransport::default()
  };
  let writer = DevFsWriter::new(transport, DevFsConfig::default());

  let report = writer.write(batch(10)).await.unwrap();

  assert_eq!(report.uploaded.len(), 10);
  assert!(report.abandoned.is_empty());
  assert_eq!(writer.transport().attempts("assets/00.bin"), 2);
  assert_eq!(writer.transport().attempts("assets/01.bin"), 3);
  assert_eq!(writer.transport().attempts("assets/02.bin"), 4);
}

#[tokio::test]
async fn one_socket_failure_fails_the_write() {
  let transport = ScriptedTransport {
    socket_failure: Some("assets/07.bin".to_string()),
    transient: HashMap::from([("assets/01.bin".to_string(), 1)]),
    ..ScriptedTransport::default()
  };
  let writer = DevFsWriter::new(transport, DevFsConfig::default());

  let err = writer.write(batch(20)).await.unwrap_err();

  match err {
    UploadError::Fatal { uri, source } => {
      assert_eq!(uri, "assets/07.bin");
      assert_eq!(source, TransportError::Fatal("socket closed".to_string()));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(writer.transport().max_in_flight.load(Ordering::SeqCst) <= 6);
}

#[tokio::test]
async fn http_upload_sends_gzipped_bodies() {
  let mut server = Server::new_async().await;
  let encoded_uri = STANDARD.encode("lib/main.dart");
  let mock = server
    .mock("PUT", "/devfs/")
    .match_header("dev_fs_name", "app")
    .match_header("dev_fs_uri_b64", encoded_uri.as_str())
    .with_status(200)
    .create_async()
    .await;

  let text = "void main() {}\n".repeat(100);
  let mut entries = HashMap::new();
  entries.insert("lib/main.dart".to_string(), DevFsContent::string(text.clone()));
  let writer = DevFsWriter::new(
    HttpUploadTransport::new(format!("{}/devfs/", server.url()), "app"),
    DevFsConfig::default(),
  );

  let report = writer.write(entries).await.unwrap();

  mock.assert_async().await;
  assert_eq!(report.uploaded, vec!["lib/main.dart"]);
  assert!(report.bytes < text.len() as u64);

  // The counted bytes are the gzip stream of the content.
  let compressed = DevFsContent::string(text.clone()).compressed_chunks().unwrap().collect_bytes().unwrap();
  let mut decoded = String::new();
  GzDecoder::new(compressed.as_slice()).read_to_string(&mut decoded).unwrap();
  assert_eq!(decoded, text);
  assert_eq!(report.bytes, compressed.len() as u64);
}

#[tokio::test]
async fn http_server_errors_are_retried_then_abandoned() {
  let mut server = Server::new_async().await;
  let mock = server
    .mock("PUT", Matcher::Any)
    .with_status(500)
    .expect(4)
    .create_async()
    .await;

  let mut entries = HashMap::new();
  entries.insert("lib/a.dart".to_string(), DevFsContent::string("a"));
  let writer = DevFsWriter::new(HttpUploadTransport::new(format!("{}/", server.url()), "app"), DevFsConfig::default());

  let report = writer.write(entries).await.unwrap();

  assert_eq!(report.abandoned, vec!["lib/a.dart"]);
  mock.assert_async().await;
}

#[tokio::test]
async fn device_hanging_up_fails_the_write() {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  tokio::spawn(async move {
    while let Ok((mut socket, _)) = listener.accept().await {
      let mut buf = [0u8; 4096];
      let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
    }
  });

  let writer = DevFsWriter::new(
    HttpUploadTransport::new(format!("http://127.0.0.1:{port}/"), "app"),
    DevFsConfig::default(),
  );

  let err = writer.write(batch(8)).await.unwrap_err();
  assert!(
    matches!(err, UploadError::Fatal { source: TransportError::Fatal(_), .. }),
    "got {err}"
  );
}
