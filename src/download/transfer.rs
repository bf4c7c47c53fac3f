//! Resumable single-file HTTP transfer.
//!
//! A transfer streams one URL into a `_tmp` sibling of its destination and
//! renames it onto the destination only after the full body has been
//! consumed. If a partial temp file already exists, the request carries a
//! `Range` header starting at its size; servers that answer with 206 resume
//! the stream, anything else restarts the temp file from offset zero.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, TEMP_SUFFIX};
use super::error::DownloadError;
use crate::progress::ItemReporter;

/// HTTP client for resumable streaming downloads.
///
/// Create one per run and share it across all concurrent transfers; the
/// underlying reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 5min read).
    ///
    /// # Panics
    ///
    /// Panics if the reqwest builder fails with the static configuration,
    /// which does not happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the reqwest builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(concat!("mangadm/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Downloads `url` to `dest`, resuming a partial `_tmp` file if present.
    ///
    /// Byte progress is pushed to `reporter` after every chunk. Cancellation
    /// stops the stream between chunks and leaves the temp file on disk.
    ///
    /// Returns the total size of the destination file on success.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` for invalid URLs, network failures, timeouts,
    /// non-success HTTP statuses, local IO failures, and cancellation. The
    /// temp file is retained on every error path so the next attempt can
    /// resume from the bytes already on disk.
    #[instrument(skip(self, reporter, cancel), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        reporter: &ItemReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        // An already-cancelled token must not issue the request at all.
        if cancel.is_cancelled() {
            return Err(DownloadError::cancelled(url));
        }

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let temp = temp_path(dest);
        let existing = tokio::fs::metadata(&temp)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);

        let mut request = self.client.get(url);
        if existing > 0 {
            debug!(offset = existing, "requesting ranged resume");
            request = request.header(RANGE, format!("bytes={existing}-"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        // Only a 206 answer means the server honored the range. A 200 body
        // is the whole file, so the temp file restarts from offset zero in
        // truncate mode even when Accept-Ranges is advertised.
        let resumed = existing > 0 && status == StatusCode::PARTIAL_CONTENT;
        let offset = if resumed { existing } else { 0 };

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|remaining| remaining.saturating_add(offset));

        let file = if resumed {
            OpenOptions::new()
                .append(true)
                .open(&temp)
                .await
                .map_err(|e| DownloadError::io(temp.clone(), e))?
        } else {
            File::create(&temp)
                .await
                .map_err(|e| DownloadError::io(temp.clone(), e))?
        };

        reporter.bytes(offset, total);

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_done = offset;

        loop {
            // Biased: a ready cancellation always wins over a ready chunk,
            // so a single-chunk body cannot slip through to the rename.
            let chunk_result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    // Flush whatever already landed so the resume offset on
                    // the next run reflects it.
                    let _ = writer.flush().await;
                    info!(bytes = bytes_done, "transfer cancelled, temp file retained");
                    return Err(DownloadError::cancelled(url));
                }
                chunk = stream.next() => chunk,
            };

            let Some(chunk_result) = chunk_result else {
                break;
            };
            let chunk = chunk_result.map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(temp.clone(), e))?;
            bytes_done += chunk.len() as u64;
            reporter.bytes(bytes_done, total);
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(temp.clone(), e))?;

        tokio::fs::rename(&temp, dest)
            .await
            .map_err(|e| DownloadError::io(dest.to_path_buf(), e))?;

        info!(
            path = %dest.display(),
            bytes = bytes_done,
            resumed,
            "transfer complete"
        );
        Ok(bytes_done)
    }
}

/// Returns the in-flight temp path for a destination: the same path with
/// [`TEMP_SUFFIX`] appended to the file name.
#[must_use]
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(TEMP_SUFFIX);
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::progress::test_sink::RecordingSink;
    use crate::progress::{ChapterContext, ProgressEvent};

    fn reporter(sink: &Arc<RecordingSink>) -> ItemReporter {
        ItemReporter::new(sink.clone(), 1, ChapterContext { index: 1, count: 1 })
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/out/ch/01.jpg")),
            PathBuf::from("/out/ch/01.jpg_tmp")
        );
    }

    #[tokio::test]
    async fn test_fetch_streams_body_and_renames_temp() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/01.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"page bytes"))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let dest = dir.path().join("01.jpg");
        let cancel = CancellationToken::new();

        let bytes = client
            .fetch(
                &format!("{}/01.jpg", server.uri()),
                &dest,
                &reporter(&sink),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"page bytes");
        assert!(!temp_path(&dest).exists(), "temp file must be renamed away");
    }

    #[tokio::test]
    async fn test_fetch_resumes_from_temp_file_size() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("02.jpg");

        // Seed a 4-byte partial temp file; the server returns the tail.
        std::fs::write(temp_path(&dest), b"page").unwrap();

        Mock::given(method("GET"))
            .and(path("/02.jpg"))
            .and(header("Range", "bytes=4-"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Length", "6")
                    .set_body_bytes(b" bytes"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();

        let bytes = client
            .fetch(
                &format!("{}/02.jpg", server.uri()),
                &dest,
                &reporter(&sink),
                &cancel,
            )
            .await
            .unwrap();

        // Final size is the server-reported remainder plus the resume offset.
        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"page bytes");

        // Progress reported the resumed offset and the derived total.
        let events = sink.events.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::Item {
                bytes_done: 4,
                bytes_total: Some(10),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_restarts_when_range_not_honored() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("03.png");

        std::fs::write(temp_path(&dest), b"stale-partial").unwrap();

        // Server ignores the range and replies 200 with the full body.
        Mock::given(method("GET"))
            .and(path("/03.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full body"))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();

        client
            .fetch(
                &format!("{}/03.png", server.uri()),
                &dest,
                &reporter(&sink),
                &cancel,
            )
            .await
            .unwrap();

        // The stale partial must not be prepended to the fresh body.
        assert_eq!(std::fs::read(&dest).unwrap(), b"full body");
    }

    #[tokio::test]
    async fn test_fetch_http_error_surfaces_status() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();

        let result = client
            .fetch(
                &format!("{}/missing.jpg", server.uri()),
                &dir.path().join("missing.jpg"),
                &reporter(&sink),
                &cancel,
            )
            .await;

        match result {
            Err(DownloadError::HttpStatus { status: 404, .. }) => {}
            other => panic!("expected HttpStatus 404, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let dir = TempDir::new().unwrap();
        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();

        let result = client
            .fetch(
                "not-a-valid-url",
                &dir.path().join("x.jpg"),
                &reporter(&sink),
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_cancelled_before_request_keeps_temp() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("04.jpg");
        std::fs::write(temp_path(&dest), b"par").unwrap();

        // A pre-cancelled token must short-circuit before any request goes
        // out, even when the server would answer instantly with the whole
        // body in one chunk.
        Mock::given(method("GET"))
            .and(path("/04.jpg"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"tial body"))
            .expect(0)
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client
            .fetch(
                &format!("{}/04.jpg", server.uri()),
                &dest,
                &reporter(&sink),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(DownloadError::Cancelled { .. })));
        assert!(temp_path(&dest).exists(), "temp file must survive cancellation");
        assert!(!dest.exists());
    }
}
