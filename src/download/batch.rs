//! Bounded-concurrency batch downloader for one chapter's pages.
//!
//! Each page URL maps to an index-derived filename (`01.jpg`, `02.png`, ...).
//! Pages whose destination already exists are SKIPPED without network
//! activity; the rest run as independent tasks gated by a counting
//! semaphore. The batch itself never fails as a unit — every page resolves
//! to exactly one [`DownloadResult`] inside the [`BatchOutcome`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::DEFAULT_CONCURRENCY;
use super::error::DownloadError;
use super::outcome::{BatchOutcome, DownloadResult};
use super::retry::{classify_error, RetryDecision, RetryPolicy};
use super::transfer::{temp_path, HttpClient};
use crate::assets::PLACEHOLDER_IMAGE;
use crate::progress::{ChapterContext, ItemReporter, ProgressEvent, ProgressSink};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 64;

/// Error type for batch downloader construction.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Downloads many URLs into one directory under a concurrency cap.
#[derive(Debug)]
pub struct BatchDownloader {
    client: HttpClient,
    retry_policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl BatchDownloader {
    /// Creates a batch downloader.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidConcurrency`] when `concurrency` is
    /// outside `1..=64`.
    pub fn new(
        client: HttpClient,
        retry_policy: RetryPolicy,
        concurrency: usize,
    ) -> Result<Self, BatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(BatchError::InvalidConcurrency { value: concurrency });
        }
        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating batch downloader"
        );
        Ok(Self {
            client,
            retry_policy,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Creates a batch downloader with the default concurrency cap.
    #[must_use]
    pub fn with_defaults(client: HttpClient, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Returns the configured concurrency cap.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Downloads every URL into `dest_dir` as `{index:02}.{ext}`.
    ///
    /// Submission follows URL order; completion order is unconstrained and
    /// results are matched back to their index. Cancellation stops new
    /// submissions, records not-yet-started pages as failed, and leaves
    /// in-flight temp files on disk.
    ///
    /// # Errors
    ///
    /// Returns an error only when the destination directory cannot be
    /// created; per-page failures live inside the returned outcome.
    #[instrument(skip(self, urls, sink, cancel), fields(pages = urls.len(), dest = %dest_dir.display()))]
    pub async fn download_chapter(
        &self,
        urls: &[String],
        dest_dir: &Path,
        chapter: ChapterContext,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, DownloadError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DownloadError::io(dest_dir.to_path_buf(), e))?;

        let total = urls.len();
        let done = Arc::new(AtomicUsize::new(0));
        sink.on_event(ProgressEvent::Batch {
            done: 0,
            total,
            chapter,
        });

        let mut slots: Vec<Option<DownloadResult>> = Vec::new();
        slots.resize_with(total, || None);
        let mut handles = Vec::new();

        for (slot, url) in urls.iter().enumerate() {
            let page = slot + 1;
            let dest = dest_dir.join(page_filename(page, url));

            if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                debug!(page, path = %dest.display(), "destination exists, skipping");
                slots[slot] = Some(DownloadResult::skipped(url, dest));
                report_batch(sink, &done, total, chapter);
                continue;
            }

            // Acquire the permit before spawning so cancellation can stop
            // queued pages from ever starting.
            let permit = tokio::select! {
                () = cancel.cancelled() => {
                    slots[slot] = Some(DownloadResult::failed(url, DownloadError::cancelled(url)));
                    report_batch(sink, &done, total, chapter);
                    continue;
                }
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        slots[slot] =
                            Some(DownloadResult::failed(url, DownloadError::cancelled(url)));
                        report_batch(sink, &done, total, chapter);
                        continue;
                    }
                },
            };

            let client = self.client.clone();
            let policy = self.retry_policy.clone();
            let url = url.clone();
            let cancel = cancel.clone();
            let sink_task = Arc::clone(sink);
            let done = Arc::clone(&done);

            handles.push((
                slot,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII).
                    let _permit = permit;
                    let reporter = ItemReporter::new(Arc::clone(&sink_task), page, chapter);
                    let result =
                        download_with_retry(&client, &policy, &url, dest, &reporter, &cancel)
                            .await;
                    report_batch(&sink_task, &done, total, chapter);
                    result
                }),
            ));
        }

        for (slot, handle) in handles {
            match handle.await {
                Ok(result) => slots[slot] = Some(result),
                Err(e) => {
                    warn!(page = slot + 1, error = %e, "download task panicked");
                    slots[slot] = Some(DownloadResult::failed(
                        &urls[slot],
                        DownloadError::task_aborted(&urls[slot], e.to_string()),
                    ));
                }
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(slot, result)| {
                result.unwrap_or_else(|| {
                    DownloadResult::failed(
                        &urls[slot],
                        DownloadError::task_aborted(&urls[slot], "no result recorded"),
                    )
                })
            })
            .collect();

        let outcome = BatchOutcome::new(results);
        info!(
            success = outcome.success_count(),
            skipped = outcome.skipped_count(),
            replaced = outcome.replaced_count(),
            failed = outcome.failed_count(),
            "batch complete"
        );
        Ok(outcome)
    }

    /// Downloads a single file (used for the cover image) with the same
    /// retry machinery as batch pages but no semaphore gating.
    pub async fn download_single(
        &self,
        url: &str,
        dest: PathBuf,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> DownloadResult {
        let reporter = ItemReporter::new(Arc::clone(sink), 0, ChapterContext::default());
        download_with_retry(&self.client, &self.retry_policy, url, dest, &reporter, cancel).await
    }
}

fn report_batch(
    sink: &Arc<dyn ProgressSink>,
    done: &AtomicUsize,
    total: usize,
    chapter: ChapterContext,
) {
    let done = done.fetch_add(1, Ordering::SeqCst) + 1;
    sink.on_event(ProgressEvent::Batch {
        done,
        total,
        chapter,
    });
}

/// Downloads one file, retrying per the policy and collapsing all attempts
/// into a single terminal [`DownloadResult`].
async fn download_with_retry(
    client: &HttpClient,
    policy: &RetryPolicy,
    url: &str,
    dest: PathBuf,
    reporter: &ItemReporter,
    cancel: &CancellationToken,
) -> DownloadResult {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(url, attempt, "attempting download");

        let error = match client.fetch(url, &dest, reporter, cancel).await {
            Ok(_) => return DownloadResult::success(url, dest),
            Err(e) => e,
        };

        if error.is_cancelled() {
            return DownloadResult::failed(url, error);
        }

        match policy.decide(classify_error(&error), attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    url,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying download"
                );
                tokio::select! {
                    () = cancel.cancelled() => {
                        return DownloadResult::failed(url, DownloadError::cancelled(url));
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::Replace => {
                warn!(url, error = %error, "resource gone, writing placeholder");
                return write_placeholder(url, &dest, error).await;
            }
            RetryDecision::Abort { reason } => {
                warn!(url, %reason, error = %error, "giving up on download");
                if matches!(error, DownloadError::Io { .. }) {
                    // A local write failure leaves an unusable temp file.
                    let _ = tokio::fs::remove_file(temp_path(&dest)).await;
                }
                return DownloadResult::failed(url, error);
            }
        }
    }
}

/// Writes the fixed placeholder payload to the final destination so the
/// chapter stays archivable with a visible broken-page marker.
async fn write_placeholder(url: &str, dest: &Path, cause: DownloadError) -> DownloadResult {
    // A partial temp file from an earlier transient attempt would trip the
    // completion check later; it has no further use.
    let _ = tokio::fs::remove_file(temp_path(dest)).await;

    match tokio::fs::write(dest, PLACEHOLDER_IMAGE).await {
        Ok(()) => DownloadResult::replaced(url, dest.to_path_buf(), cause),
        Err(e) => DownloadResult::failed(url, DownloadError::io(dest.to_path_buf(), e)),
    }
}

/// Derives the page filename `{index:02}.{ext}` with the extension taken
/// from the URL path (`.bin` when the URL carries none).
#[must_use]
pub fn page_filename(index: usize, url: &str) -> String {
    format!("{index:02}.{}", page_extension(url))
}

fn page_extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_owned))
        })
        .and_then(|segment| {
            segment.rfind('.').and_then(|dot| {
                let ext = segment[dot + 1..].to_lowercase();
                (!ext.is_empty() && ext.len() <= 5).then_some(ext)
            })
        })
        .unwrap_or_else(|| "bin".to_string())
}
