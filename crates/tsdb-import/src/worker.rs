//! File import workers
//!
//! A worker takes one path at a time from the work queue and runs it through
//! gunzip → [`LineReframer`] → [`BatchAssembler`] → [`IngestClient`]. Reading and
//! decompression run on the blocking pool; finished batches come back over a small
//! channel and are posted in order by the worker task itself.
//!
//! A file only gets a completion notice when it was read to its end. Files that
//! fail to open, decode or read are logged and stay in the coordinator's pending
//! set until the process restarts.
//!
//! This includes a file picked up while its producer is still writing it: a
//! zero-byte or truncated file fails the gzip header check and is not retried.
//! Producers should write under another extension and rename when done.

use crate::batch::{Batch, BatchAssembler};
use crate::client::IngestClient;
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::reframe::LineReframer;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Batches buffered between the reader thread and the delivering task
const BATCH_CHANNEL_DEPTH: usize = 4;

/// Outcome of one file read to its end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileReport {
    pub lines: u64,
    pub delivered: u64,
    pub dropped: u64,
}

pub struct Worker {
    id: usize,
    batch_size: NonZeroUsize,
    fragment_size: usize,
    client: IngestClient,
    todo: async_channel::Receiver<PathBuf>,
    done: mpsc::Sender<PathBuf>,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        id: usize,
        config: &ImportConfig,
        client: IngestClient,
        todo: async_channel::Receiver<PathBuf>,
        done: mpsc::Sender<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            batch_size: config.batch_size,
            fragment_size: config.fragment_size,
            client,
            todo,
            done,
            cancel,
        }
    }

    /// Process queued files until cancelled or the work queue closes.
    ///
    /// Cancellation is only observed between files.
    pub async fn run(self) {
        debug!(worker = self.id, "file importer started");

        loop {
            let path = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.todo.recv() => match next {
                    Ok(path) => path,
                    Err(_) => {
                        debug!(worker = self.id, "work queue closed");
                        break;
                    },
                },
            };

            match self.import_file(&path).await {
                Ok(report) => {
                    info!(
                        worker = self.id,
                        path = %path.display(),
                        lines = report.lines,
                        delivered = report.delivered,
                        dropped = report.dropped,
                        "metric file imported"
                    );
                    if self.done.send(path).await.is_err() {
                        warn!(worker = self.id, "completion queue closed");
                    }
                },
                Err(e) => {
                    error!(worker = self.id, path = %path.display(), error = %e, "abandoning metric file");
                },
            }
        }

        info!(worker = self.id, "file importer exits");
    }

    /// Import one file, delivering its batches in order
    pub async fn import_file(&self, path: &Path) -> Result<FileReport> {
        let (tx, mut rx) = mpsc::channel::<Batch>(BATCH_CHANNEL_DEPTH);
        let owned = path.to_path_buf();
        let batch_size = self.batch_size;
        let fragment_size = self.fragment_size;

        let reader =
            tokio::task::spawn_blocking(move || read_batches(&owned, batch_size, fragment_size, tx));

        let mut report = FileReport::default();
        while let Some(batch) = rx.recv().await {
            match self.client.deliver(&batch.payload).await {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    debug!(path = %path.display(), batch = batch.sequence, lines = batch.lines, "batch dropped");
                    report.dropped += 1;
                },
            }
        }

        report.lines = reader.await??;
        Ok(report)
    }
}

/// Open, decompress and batch one file. Runs on the blocking pool; the file and
/// decoder are dropped on every return path.
fn read_batches(
    path: &Path,
    batch_size: NonZeroUsize,
    fragment_size: usize,
    tx: mpsc::Sender<Batch>,
) -> Result<u64> {
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut decoded = BufReader::with_capacity(fragment_size, MultiGzDecoder::new(file));
    // surface a bad gzip header as a decode failure rather than a read failure
    decoded.fill_buf().map_err(|source| ImportError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let send = |batch: Batch| {
        tx.blocking_send(batch)
            .map_err(|_| ImportError::BatchChannelClosed(path.to_path_buf()))
    };

    let mut assembler = BatchAssembler::new(batch_size);
    for line in LineReframer::new(decoded) {
        let line = line.map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(batch) = assembler.push_line(&line) {
            send(batch)?;
        }
    }

    let lines = assembler.line_count();
    if let Some(batch) = assembler.finish() {
        send(batch)?;
    }

    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    use tempfile::TempDir;
    use wiremock::{
        matchers::{body_string, method},
        Mock, MockServer, ResponseTemplate,
    };

    struct Harness {
        worker: Worker,
        todo_tx: async_channel::Sender<PathBuf>,
        done_rx: mpsc::Receiver<PathBuf>,
        cancel: CancellationToken,
    }

    fn harness(server: &MockServer, batch_size: usize) -> Harness {
        let config = ImportConfig::builder()
            .endpoint(format!("{}/api/put", server.uri()))
            .batch_size(batch_size)
            .fragment_size(16)
            .build()
            .unwrap();
        let client = IngestClient::new(config.endpoint.clone()).unwrap();
        let (todo_tx, todo_rx) = async_channel::bounded(16);
        let (done_tx, done_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let worker = Worker::new(0, &config, client, todo_rx, done_tx, cancel.clone());
        Harness {
            worker,
            todo_tx,
            done_rx,
            cancel,
        }
    }

    fn gzip(lines: &[&str]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for line in lines {
            writeln!(encoder, "{}", line).unwrap();
        }
        encoder.finish().unwrap()
    }

    fn write_gz(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, gzip(lines)).unwrap();
        path
    }

    async fn ok_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_import_file_delivers_batches_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("[\n{\"a\":1},\n{\"a\":2}\n]"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string("[\n{\"a\":3}\n]"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let path = write_gz(&dir, "m.gz", &[r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
        let h = harness(&server, 2);

        let report = h.worker.import_file(&path).await.unwrap();
        assert_eq!(
            report,
            FileReport {
                lines: 3,
                delivered: 2,
                dropped: 0
            }
        );

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, b"[\n{\"a\":1},\n{\"a\":2}\n]".to_vec());
        assert_eq!(requests[1].body, b"[\n{\"a\":3}\n]".to_vec());
    }

    #[tokio::test]
    async fn test_rejected_batch_is_dropped_and_file_completes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("[\n{\"a\":3},\n{\"a\":4}\n]"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let lines = [
            r#"{"a":1}"#,
            r#"{"a":2}"#,
            r#"{"a":3}"#,
            r#"{"a":4}"#,
            r#"{"a":5}"#,
        ];
        let path = write_gz(&dir, "m.gz", &lines);
        let mut h = harness(&server, 2);

        h.todo_tx.send(path.clone()).await.unwrap();
        h.todo_tx.close();
        h.worker.run().await;

        assert_eq!(h.done_rx.recv().await.unwrap(), path);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_file_completes_without_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let path = write_gz(&dir, "empty.gz", &[]);
        let mut h = harness(&server, 2);

        h.todo_tx.send(path.clone()).await.unwrap();
        h.todo_tx.close();
        h.worker.run().await;

        assert_eq!(h.done_rx.recv().await.unwrap(), path);
        assert!(h.done_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_gets_no_completion() {
        let server = ok_server().await;
        let dir = TempDir::new().unwrap();
        let mut h = harness(&server, 2);

        let err = h
            .worker
            .import_file(&dir.path().join("gone.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Open { .. }));

        h.todo_tx.send(dir.path().join("gone.gz")).await.unwrap();
        h.todo_tx.close();
        h.worker.run().await;
        assert!(h.done_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_gzip_is_decode_error() {
        let server = ok_server().await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.gz");
        std::fs::write(&path, b"{\"a\":1}\n").unwrap();
        let h = harness(&server, 2);

        let err = h.worker.import_file(&path).await.unwrap_err();
        assert!(matches!(err, ImportError::Decode { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_byte_file_stays_pending() {
        let server = ok_server().await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.gz");
        std::fs::write(&path, b"").unwrap();
        let mut h = harness(&server, 2);

        let err = h.worker.import_file(&path).await.unwrap_err();
        assert!(matches!(err, ImportError::Decode { .. }));

        h.todo_tx.send(path).await.unwrap();
        h.todo_tx.close();
        h.worker.run().await;

        assert!(h.done_rx.try_recv().is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checksum_failure_abandons_rest_of_file() {
        let server = ok_server().await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.gz");
        let mut bytes = gzip(&[r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
        // CRC32 sits in the 8 byte trailer
        let crc = bytes.len() - 8;
        bytes[crc] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();
        let mut h = harness(&server, 2);

        h.todo_tx.send(path).await.unwrap();
        h.todo_tx.close();
        h.worker.run().await;

        assert!(h.done_rx.try_recv().is_err());
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, b"[\n{\"a\":1},\n{\"a\":2}\n]".to_vec());
    }

    #[tokio::test]
    async fn test_cancelled_worker_leaves_queue_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut h = harness(&server, 2);
        for name in ["a.gz", "b.gz", "c.gz"] {
            let path = write_gz(&dir, name, &[r#"{"a":1}"#]);
            h.todo_tx.send(path).await.unwrap();
        }

        h.cancel.cancel();
        h.worker.run().await;

        assert_eq!(h.todo_tx.len(), 3);
        assert!(h.done_rx.try_recv().is_err());
    }
}
