//! Resumable HTTP download engine for chapter pages.
//!
//! This module provides streaming downloads with temp-file staging,
//! Range-header resume, exponential-backoff retries, placeholder
//! substitution for permanently missing pages, and a semaphore-bounded
//! batch runner that fetches one chapter's pages concurrently.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use mangadm_core::download::{BatchDownloader, HttpClient, RetryPolicy};
//! use mangadm_core::progress::{ChapterContext, NoopProgress, ProgressSink};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = BatchDownloader::with_defaults(HttpClient::new(), RetryPolicy::default());
//! let sink: Arc<dyn ProgressSink> = Arc::new(NoopProgress);
//! let urls = vec!["https://cdn.example.com/ch1/1.jpg".to_string()];
//! let outcome = downloader
//!     .download_chapter(
//!         &urls,
//!         Path::new("./Chapter 1_tmp"),
//!         ChapterContext { index: 1, count: 1 },
//!         &sink,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("resolved: {}", outcome.all_success());
//! # Ok(())
//! # }
//! ```

mod batch;
mod constants;
mod error;
mod outcome;
mod retry;
mod transfer;

pub use batch::{page_filename, BatchDownloader, BatchError};
pub use constants::{DEFAULT_CONCURRENCY, TEMP_SUFFIX};
pub use error::DownloadError;
pub use outcome::{BatchOutcome, DownloadResult, DownloadStatus};
pub use retry::{classify_error, FailureKind, RetryDecision, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use transfer::{temp_path, HttpClient};
