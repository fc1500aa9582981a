//! Size-aware transfer core: staging, the resumable chunked upload protocol
//! and the symmetric download path.
//!
//! The packaging pipeline produces an unbounded stream, so the payload is
//! first staged to a temp file to learn its size and to make retries possible
//! from a stable source. Payloads under the chunk threshold go up as one
//! multipart request; everything else runs the three-phase
//! init → chunk → complete protocol with per-chunk retry and backoff.
//!
//! All wire operations live behind [`BaseFileTransport`] so the protocol
//! logic is testable without a server, and so the core never owns
//! process-exit decisions: an expired token surfaces as
//! [`TransferError::AuthExpired`] and the command layer decides what to do.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::progress;

/// Fixed threshold between the single-request and chunked paths, and the
/// size of every chunk except the last.
pub const CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Attempts per chunk before the whole transfer aborts.
pub const CHUNK_ATTEMPTS: u32 = 3;

/// Backoff after the first failed attempt; doubles per further failure.
pub const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Transfer tuning passed into the operations rather than read from process
/// state, so transfers with different settings can coexist (and tests can
/// shrink the sizes and sleeps).
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub chunk_size: u64,
    pub chunk_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_attempts: CHUNK_ATTEMPTS,
            backoff_base: BACKOFF_BASE,
        }
    }
}

/// The two payload kinds the preview server stores per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Db,
    Files,
}

impl TransferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferKind::Db => "db",
            TransferKind::Files => "files",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned session correlating init, chunk and complete calls.
/// Never persisted: a failed process restarts the whole upload.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
}

/// Transport-level failure of a single wire call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("authentication failed")]
    AuthExpired,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to stage payload to a temp file: {0}")]
    Staging(#[source] io::Error),
    #[error("chunked upload init failed: {0}")]
    SessionInit(#[source] TransportError),
    #[error("chunk {index} failed after {attempts} attempts: {source}")]
    ChunkUpload {
        index: u64,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("chunked upload completion failed: {0}")]
    SessionComplete(#[source] TransportError),
    #[error("upload failed: {0}")]
    Upload(#[source] TransportError),
    #[error("download failed: {0}")]
    Download(#[source] TransportError),
    #[error("authentication failed: the server rejected the token")]
    AuthExpired,
}

/// Wire operations against the preview server's base-files endpoints.
///
/// Implemented over HTTP by [`crate::client::ApiClient`]; mocked in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BaseFileTransport: Send + Sync {
    /// Opens a chunked upload session for `total_chunks`/`total_size`.
    async fn init_upload(
        &self,
        slug: &str,
        kind: TransferKind,
        total_chunks: u64,
        total_size: u64,
    ) -> Result<UploadSession, TransportError>;

    /// Sends one chunk; the server assumes contiguous, in-order delivery.
    async fn upload_chunk(
        &self,
        slug: &str,
        kind: TransferKind,
        upload_id: &str,
        index: u64,
        payload: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Finalises the session; server-side reassembly can still fail here.
    async fn complete_upload(
        &self,
        slug: &str,
        kind: TransferKind,
        upload_id: &str,
    ) -> Result<(), TransportError>;

    /// Streams a staged file below the chunk threshold as one multipart
    /// request, reporting progress as it reads.
    async fn upload_single(
        &self,
        slug: &str,
        kind: TransferKind,
        filename: &str,
        staged: &Path,
        total_size: u64,
    ) -> Result<(), TransportError>;

    /// Streams `GET …/{kind}/download` straight into `dest`, no staging.
    /// Returns the number of bytes written.
    async fn download_base_file(
        &self,
        project: &str,
        mr_id: u32,
        kind: TransferKind,
        dest: &Path,
    ) -> Result<u64, TransportError>;
}

/// Copies the pipeline's output to a temp file, counting bytes. This is the
/// only point where the total size becomes known. The temp file is owned by
/// the returned handle and removed on every exit path.
pub fn stage_to_temp(mut reader: impl Read) -> Result<(NamedTempFile, u64), TransferError> {
    let mut staged = NamedTempFile::new().map_err(TransferError::Staging)?;
    eprint!("Buffering to temp file...\r");
    let written = io::copy(&mut reader, staged.as_file_mut()).map_err(TransferError::Staging)?;
    eprintln!("Buffered {} to temp file.  ", progress::format_bytes(written));
    debug!(bytes = written, path = %staged.path().display(), "payload staged");
    Ok((staged, written))
}

/// Number of chunks for a payload: `ceil(total_size / chunk_size)`.
pub fn total_chunks(total_size: u64, chunk_size: u64) -> u64 {
    total_size.div_ceil(chunk_size)
}

/// Stages `reader`, then uploads it single-shot (below the chunk threshold)
/// or via the chunked protocol. No network call happens for a payload that
/// could not be staged.
pub async fn upload_stream(
    transport: &dyn BaseFileTransport,
    config: &TransferConfig,
    slug: &str,
    kind: TransferKind,
    filename: &str,
    reader: impl Read,
) -> Result<(), TransferError> {
    let (staged, total_size) = stage_to_temp(reader)?;

    if total_size < config.chunk_size {
        info!(slug, %kind, total_size, "uploading in a single request");
        transport
            .upload_single(slug, kind, filename, staged.path(), total_size)
            .await
            .map_err(|e| match e {
                TransportError::AuthExpired => TransferError::AuthExpired,
                other => TransferError::Upload(other),
            })?;
    } else {
        upload_chunked(transport, config, slug, kind, staged.path(), total_size).await?;
    }

    Ok(())
}

/// The linear INIT → UPLOADING(0..N-1) → COMPLETE protocol. Chunks are sent
/// strictly in index order, one at a time; boundaries are a pure function of
/// the staged size and the configured chunk size.
async fn upload_chunked(
    transport: &dyn BaseFileTransport,
    config: &TransferConfig,
    slug: &str,
    kind: TransferKind,
    staged: &Path,
    total_size: u64,
) -> Result<(), TransferError> {
    let chunks = total_chunks(total_size, config.chunk_size);

    let session = match transport.init_upload(slug, kind, chunks, total_size).await {
        Ok(session) => session,
        Err(TransportError::AuthExpired) => return Err(TransferError::AuthExpired),
        Err(e) => return Err(TransferError::SessionInit(e)),
    };
    info!(slug, %kind, upload_id = %session.upload_id, chunks, total_size, "chunked upload session opened");

    eprintln!(
        "Uploading {} in {} chunks of {}...",
        progress::format_bytes(total_size),
        chunks,
        progress::format_bytes(config.chunk_size),
    );

    let mut file = File::open(staged).map_err(TransferError::Staging)?;
    let bar = progress::transfer_bar(total_size, "Uploading");
    let mut sent: u64 = 0;

    for index in 0..chunks {
        // Every chunk except the last is exactly chunk_size; the last is the
        // remainder, always > 0 and <= chunk_size.
        let len = (total_size - sent).min(config.chunk_size) as usize;
        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload).map_err(TransferError::Staging)?;

        send_chunk_with_retry(transport, config, slug, kind, &session.upload_id, index, chunks, payload).await?;

        sent += len as u64;
        bar.set_position(sent);
    }
    bar.finish();

    eprintln!("Finalizing upload...");
    match transport.complete_upload(slug, kind, &session.upload_id).await {
        Ok(()) => Ok(()),
        Err(TransportError::AuthExpired) => Err(TransferError::AuthExpired),
        Err(e) => Err(TransferError::SessionComplete(e)),
    }
}

/// Sends one chunk with up to `chunk_attempts` tries, sleeping
/// `backoff_base * 2^(attempt-1)` between tries, always with the identical
/// payload and index. An expired token is not retried.
#[allow(clippy::too_many_arguments)]
async fn send_chunk_with_retry(
    transport: &dyn BaseFileTransport,
    config: &TransferConfig,
    slug: &str,
    kind: TransferKind,
    upload_id: &str,
    index: u64,
    chunks: u64,
    payload: Vec<u8>,
) -> Result<(), TransferError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match transport
            .upload_chunk(slug, kind, upload_id, index, payload.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(TransportError::AuthExpired) => return Err(TransferError::AuthExpired),
            Err(e) => {
                warn!(index, attempt, error = %e, "chunk upload attempt failed");
                if attempt >= config.chunk_attempts {
                    return Err(TransferError::ChunkUpload {
                        index,
                        attempts: attempt,
                        source: e,
                    });
                }
                let wait = retry_backoff(config.backoff_base, attempt);
                eprintln!("  Retrying chunk {}/{} in {:?}...", index + 1, chunks, wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Wait before the retry that follows `failed_attempts` failures: the base
/// for the first retry, doubling for each further one.
fn retry_backoff(base: Duration, failed_attempts: u32) -> Duration {
    base * 2u32.pow(failed_attempts - 1)
}

/// Downloads one base file to `dest`. On any failure the partially written
/// destination is removed so it can never be mistaken for a complete archive.
pub async fn download_to_file(
    transport: &dyn BaseFileTransport,
    project: &str,
    mr_id: u32,
    kind: TransferKind,
    dest: &Path,
) -> Result<u64, TransferError> {
    match transport.download_base_file(project, mr_id, kind, dest).await {
        Ok(written) => {
            info!(project, mr_id, %kind, written, dest = %dest.display(), "download complete");
            Ok(written)
        }
        Err(e) => {
            let _ = std::fs::remove_file(dest);
            Err(match e {
                TransportError::AuthExpired => TransferError::AuthExpired,
                other => TransferError::Download(other),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    const MIB: u64 = 1024 * 1024;

    fn test_config() -> TransferConfig {
        TransferConfig {
            chunk_size: 50,
            chunk_attempts: 3,
            backoff_base: Duration::from_millis(1),
        }
    }

    fn http_error() -> TransportError {
        TransportError::Status {
            status: 500,
            body: "boom".into(),
        }
    }

    #[test]
    fn chunk_count_is_ceiling_division() {
        assert_eq!(total_chunks(120 * MIB, 50 * MIB), 3);
        assert_eq!(total_chunks(100 * MIB, 50 * MIB), 2);
        assert_eq!(total_chunks(50 * MIB, 50 * MIB), 1);
        assert_eq!(total_chunks(1, 50 * MIB), 1);
    }

    #[test]
    fn last_chunk_is_remainder_and_positive() {
        let (total, chunk) = (120 * MIB, 50 * MIB);
        let n = total_chunks(total, chunk);
        let last = total - chunk * (n - 1);
        assert_eq!(last, 20 * MIB);
        assert!(last > 0 && last <= chunk);
    }

    #[test]
    fn backoff_sequence_doubles_from_two_seconds() {
        let base = TransferConfig::default().backoff_base;
        assert_eq!(retry_backoff(base, 1), Duration::from_secs(2));
        assert_eq!(retry_backoff(base, 2), Duration::from_secs(4));
    }

    #[test]
    fn staging_preserves_bytes_and_counts_them() {
        let payload = vec![7u8; 1234];
        let (staged, written) = stage_to_temp(payload.as_slice()).unwrap();
        assert_eq!(written, 1234);
        assert_eq!(std::fs::read(staged.path()).unwrap(), payload);
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let (staged, _) = stage_to_temp(&b"x"[..]).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn staging_failure_happens_before_any_network_call() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("producer died"))
            }
        }

        // No expectations: any transport call would panic the test.
        let transport = MockBaseFileTransport::new();
        let err = futures::executor::block_on(upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            FailingReader,
        ))
        .unwrap_err();
        assert!(matches!(err, TransferError::Staging(_)));
    }

    #[tokio::test]
    async fn small_payload_uses_single_request_only() {
        let payload = vec![1u8; 10];
        let expected = payload.clone();

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_upload_single()
            .withf(move |slug, kind, filename, staged, total| {
                slug == "proj"
                    && *kind == TransferKind::Db
                    && filename == "dump.sql.gz"
                    && *total == 10
                    && std::fs::read(staged).unwrap() == expected
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        // No init/chunk/complete expectations: the chunked protocol must not
        // be touched at all for a payload under the threshold.

        upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn large_payload_is_partitioned_in_order_and_reassembles_exactly() {
        // 120 units with a 50-unit chunk: sizes [50, 50, 20].
        let payload: Vec<u8> = (0..120u32).map(|i| (i % 251) as u8).collect();
        let received = Arc::new(Mutex::new(Vec::new()));

        let mut transport = MockBaseFileTransport::new();
        let mut seq = Sequence::new();

        transport
            .expect_init_upload()
            .withf(|slug, kind, chunks, total| {
                slug == "proj" && *kind == TransferKind::Files && *chunks == 3 && *total == 120
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "session-1".into(),
                })
            });

        for (index, size) in [(0u64, 50usize), (1, 50), (2, 20)] {
            let sink = Arc::clone(&received);
            transport
                .expect_upload_chunk()
                .withf(move |_, _, upload_id, i, payload| {
                    upload_id == "session-1" && *i == index && payload.len() == size
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _, _, _, payload| {
                    sink.lock().unwrap().extend_from_slice(&payload);
                    Ok(())
                });
        }

        transport
            .expect_complete_upload()
            .withf(|_, _, upload_id| upload_id == "session-1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Files,
            "files.tar.gz",
            payload.as_slice(),
        )
        .await
        .unwrap();

        assert_eq!(*received.lock().unwrap(), payload);
    }

    #[tokio::test]
    async fn payload_at_threshold_takes_chunked_path() {
        // Exactly chunk_size: one chunk of the full size.
        let payload = vec![9u8; 50];

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .withf(|_, _, chunks, total| *chunks == 1 && *total == 50)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, payload| *index == 0 && payload.len() == 50)
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        transport
            .expect_complete_upload()
            .times(1)
            .returning(|_, _, _| Ok(()));

        upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn chunk_failing_twice_succeeds_on_third_attempt() {
        let payload = vec![3u8; 80]; // chunks [50, 30]
        let chunk0_attempts = Arc::new(AtomicU32::new(0));

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });

        let counter = Arc::clone(&chunk0_attempts);
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, _| *index == 0)
            .times(3)
            .returning(move |_, _, _, _, _| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(http_error())
                } else {
                    Ok(())
                }
            });
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, _| *index == 1)
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        transport
            .expect_complete_upload()
            .times(1)
            .returning(|_, _, _| Ok(()));

        upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap();
        assert_eq!(chunk0_attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_double_between_attempts() {
        // Two failures before success: the paused clock only moves inside
        // the backoff sleeps, so elapsed time is exactly 2s + 4s.
        let payload = vec![3u8; 80];
        let config = TransferConfig {
            chunk_size: 50,
            chunk_attempts: 3,
            backoff_base: Duration::from_secs(2),
        };
        let attempts = Arc::new(AtomicU32::new(0));

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });
        let counter = Arc::clone(&attempts);
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, _| *index == 0)
            .times(3)
            .returning(move |_, _, _, _, _| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(http_error())
                } else {
                    Ok(())
                }
            });
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, _| *index == 1)
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        transport
            .expect_complete_upload()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let start = tokio::time::Instant::now();
        upload_stream(
            &transport,
            &config,
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn chunk_exhausting_attempts_aborts_without_complete() {
        let payload = vec![3u8; 80];

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });
        transport
            .expect_upload_chunk()
            .withf(|_, _, _, index, _| *index == 0)
            .times(3)
            .returning(|_, _, _, _, _| Err(http_error()));
        transport.expect_complete_upload().times(0);

        let err = upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap_err();

        match err {
            TransferError::ChunkUpload { index, attempts, .. } => {
                assert_eq!(index, 0);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ChunkUpload, got {other}"),
        }
    }

    #[tokio::test]
    async fn expired_token_aborts_without_retry() {
        let payload = vec![3u8; 80];

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });
        transport
            .expect_upload_chunk()
            .times(1)
            .returning(|_, _, _, _, _| Err(TransportError::AuthExpired));
        transport.expect_complete_upload().times(0);

        let err = upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::AuthExpired));
    }

    #[tokio::test]
    async fn failed_init_sends_no_chunks() {
        let payload = vec![3u8; 80];

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| Err(http_error()));
        transport.expect_upload_chunk().times(0);
        transport.expect_complete_upload().times(0);

        let err = upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::SessionInit(_)));
    }

    #[tokio::test]
    async fn failed_complete_is_not_success() {
        let payload = vec![3u8; 60];

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_init_upload()
            .times(1)
            .returning(|_, _, _, _| {
                Ok(UploadSession {
                    upload_id: "s".into(),
                })
            });
        transport
            .expect_upload_chunk()
            .times(2)
            .returning(|_, _, _, _, _| Ok(()));
        transport
            .expect_complete_upload()
            .times(1)
            .returning(|_, _, _| {
                Err(TransportError::Status {
                    status: 500,
                    body: "reassembly failed".into(),
                })
            });

        let err = upload_stream(
            &transport,
            &test_config(),
            "proj",
            TransferKind::Db,
            "dump.sql.gz",
            payload.as_slice(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransferError::SessionComplete(_)));
    }

    #[tokio::test]
    async fn failed_download_removes_partial_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("proj-mr-5.sql.gz");

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_download_base_file()
            .times(1)
            .returning(|_, _, _, dest| {
                // Simulate a half-written destination before the failure.
                std::fs::write(dest, b"partial").unwrap();
                Err(TransportError::Status {
                    status: 404,
                    body: "no such preview".into(),
                })
            });

        let err = download_to_file(&transport, "proj", 5, TransferKind::Db, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Download(_)));
        assert!(!dest.exists(), "partial download must be deleted");
    }

    #[tokio::test]
    async fn successful_download_reports_bytes_written() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tar.gz");

        let mut transport = MockBaseFileTransport::new();
        transport
            .expect_download_base_file()
            .times(1)
            .returning(|_, _, _, dest| {
                std::fs::write(dest, b"archive").unwrap();
                Ok(7)
            });

        let written = download_to_file(&transport, "proj", 5, TransferKind::Files, &dest)
            .await
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive");
    }
}
