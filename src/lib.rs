//! Manga Download Manager Core Library
//!
//! This library downloads manga chapters described by a JSON document:
//! sequentially over chapters, concurrently over each chapter's pages, with
//! resumable transfers, retry with backoff, placeholder substitution for
//! dead links, completion detection for idempotent re-runs, and CBZ/EPUB
//! archiving.
//!
//! # Architecture
//!
//! - [`document`] - the JSON document model (details + chapters)
//! - [`download`] - resumable HTTP transfers, retry policy, batch runner
//! - [`completion`] - on-disk chapter state detection
//! - [`orchestrator`] - the sequential chapter run loop
//! - [`archive`] - CBZ/EPUB packing of finished chapters
//! - [`progress`] - progress event sink trait for UI decoupling
//! - [`sanitize`] - filesystem-safe name mapping

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod assets;
pub mod completion;
pub mod document;
pub mod download;
pub mod orchestrator;
pub mod progress;
pub mod sanitize;

// Re-export commonly used types
pub use archive::{archive_chapter, ArchiveError, ArchiveFormat, Archiver, ZipArchiver};
pub use completion::{chapter_state, is_complete, ChapterState};
pub use document::{Chapter, DocumentError, MangaDetails, MangaDocument};
pub use download::{
    classify_error, page_filename, temp_path, BatchDownloader, BatchError, BatchOutcome,
    DownloadError, DownloadResult, DownloadStatus, FailureKind, HttpClient, RetryDecision,
    RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, TEMP_SUFFIX,
};
pub use orchestrator::{ChapterOrchestrator, OrchestratorConfig, OrchestratorError, RunSummary};
pub use progress::{ChapterContext, NoopProgress, ProgressEvent, ProgressSink};
pub use sanitize::sanitize_name;
