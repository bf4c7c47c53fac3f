//! Top-level run loop: chapters sequentially, pages concurrently.
//!
//! The orchestrator owns the document, the output layout, and the chapter
//! lifecycle: completion check, batch download into a temp directory,
//! atomic rename, archiving, and optional document pruning. One chapter's
//! failure never stops the run; cancellation does.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::archive::{ArchiveFormat, Archiver, ZipArchiver};
use crate::completion::{chapter_state, ChapterState};
use crate::document::{Chapter, DocumentError, MangaDocument};
use crate::download::{BatchDownloader, DownloadStatus, TEMP_SUFFIX};
use crate::progress::{ChapterContext, ProgressSink};
use crate::sanitize::sanitize_name;

/// Error type for orchestrator setup and run-fatal conditions.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The driving document could not be loaded or persisted.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The output layout could not be created.
    #[error("failed to prepare output directory {path}: {source}")]
    Io {
        /// The directory in question.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Run configuration, mapped one-to-one from the CLI flags.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Path to the manga JSON document.
    pub document_path: PathBuf,

    /// Directory under which the manga folder is created.
    pub dest: PathBuf,

    /// Stop after this many chapters have finished (succeeded or failed).
    /// Skipped chapters never count against the limit.
    pub limit: Option<usize>,

    /// Remove each successfully finished chapter from the document.
    pub delete_on_success: bool,

    /// Rewrite `details.json` and re-fetch the cover even when present.
    pub update_details: bool,

    /// Archive format for finished chapters.
    pub format: ArchiveFormat,
}

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Chapters fully downloaded this run.
    pub succeeded: usize,
    /// Chapters with at least one unresolved page.
    pub failed: usize,
    /// Chapters already complete on disk.
    pub skipped: usize,
}

/// Drives a whole document through download, rename, and archive.
pub struct ChapterOrchestrator {
    config: OrchestratorConfig,
    downloader: BatchDownloader,
    archiver: Box<dyn Archiver>,
    document: MangaDocument,
    base_folder: PathBuf,
}

impl ChapterOrchestrator {
    /// Loads the document and computes the output layout.
    ///
    /// # Errors
    ///
    /// Fails fast when the document is missing, malformed, or has the wrong
    /// shape; nothing is created on disk in that case.
    pub async fn new(
        config: OrchestratorConfig,
        downloader: BatchDownloader,
    ) -> Result<Self, OrchestratorError> {
        Self::with_archiver(config, downloader, Box::new(ZipArchiver)).await
    }

    /// Like [`ChapterOrchestrator::new`] with a custom archiver.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ChapterOrchestrator::new`].
    pub async fn with_archiver(
        config: OrchestratorConfig,
        downloader: BatchDownloader,
        archiver: Box<dyn Archiver>,
    ) -> Result<Self, OrchestratorError> {
        let document = MangaDocument::load(&config.document_path).await?;
        let folder_name = format!(
            "{} ({})",
            sanitize_name(document.details.title()),
            document.details.source_name()
        );
        let base_folder = config.dest.join(folder_name);
        Ok(Self {
            config,
            downloader,
            archiver,
            document,
            base_folder,
        })
    }

    /// The manga output directory, `{title} ({source})` under `dest`.
    #[must_use]
    pub fn base_folder(&self) -> &Path {
        &self.base_folder
    }

    /// The loaded document.
    #[must_use]
    pub fn document(&self) -> &MangaDocument {
        &self.document
    }

    /// Runs the whole document: metadata setup, then every chapter in
    /// order, honoring the limit and the cancellation token.
    ///
    /// # Errors
    ///
    /// Only setup problems (unwritable output root) abort the run;
    /// per-chapter failures are counted in the summary.
    #[instrument(skip_all, fields(manga = self.document.details.title()))]
    pub async fn run(
        &mut self,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, OrchestratorError> {
        tokio::fs::create_dir_all(&self.base_folder)
            .await
            .map_err(|e| OrchestratorError::Io {
                path: self.base_folder.clone(),
                source: e,
            })?;

        self.setup_metadata(sink, cancel).await;

        let chapters = self.document.chapters.clone();
        let count = chapters.len();
        let mut summary = RunSummary::default();

        for (index, chapter) in chapters.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("run cancelled, stopping before next chapter");
                break;
            }
            if self
                .config
                .limit
                .is_some_and(|limit| summary.succeeded + summary.failed >= limit)
            {
                info!(limit = self.config.limit, "chapter limit reached");
                break;
            }

            let context = ChapterContext {
                index: index + 1,
                count,
            };
            self.process_chapter(chapter, context, &mut summary, sink, cancel)
                .await;
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "run finished"
        );
        Ok(summary)
    }

    /// Writes `details.json` and fetches the cover image. Both are
    /// best-effort: metadata problems never block chapter downloads.
    async fn setup_metadata(&self, sink: &Arc<dyn ProgressSink>, cancel: &CancellationToken) {
        let details_path = self.base_folder.join("details.json");
        let details_present = tokio::fs::try_exists(&details_path).await.unwrap_or(false);
        if !details_present || self.config.update_details {
            let details = &self.document.details;
            let subset = serde_json::json!({
                "title": details.title(),
                "author": details.author,
                "artist": details.artist,
                "description": details.description,
                "genre": details.genre,
            });
            match serde_json::to_string_pretty(&subset) {
                Ok(json) => {
                    if let Err(e) = tokio::fs::write(&details_path, json).await {
                        warn!(path = %details_path.display(), error = %e, "cannot write details.json");
                    }
                }
                Err(e) => warn!(error = %e, "cannot serialize details.json"),
            }
        }

        let Some(cover_url) = self.document.details.cover.clone() else {
            return;
        };
        let cover_path = self.base_folder.join(cover_filename(&cover_url));
        let cover_present = tokio::fs::try_exists(&cover_path).await.unwrap_or(false);
        if cover_present && !self.config.update_details {
            return;
        }
        let result = self
            .downloader
            .download_single(&cover_url, cover_path, sink, cancel)
            .await;
        if result.status == DownloadStatus::Failed {
            warn!(url = cover_url, "cover download failed");
        }
    }

    async fn process_chapter(
        &mut self,
        chapter: &Chapter,
        context: ChapterContext,
        summary: &mut RunSummary,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) {
        let title = sanitize_name(chapter.title());
        if chapter.images.is_empty() {
            warn!(chapter = title, "chapter has no images, nothing to do");
            return;
        }

        let final_path = self.base_folder.join(&title);
        let temp_path = self.base_folder.join(format!("{title}{TEMP_SUFFIX}"));

        match chapter_state(
            &final_path,
            &temp_path,
            chapter.images.len(),
            ArchiveFormat::ALL,
        ) {
            ChapterState::Complete => {
                debug!(chapter = title, "already complete, skipping");
                summary.skipped += 1;
                return;
            }
            ChapterState::InProgress => {
                info!(chapter = title, "resuming partial download");
            }
            ChapterState::NotStarted => {}
        }

        let outcome = match self
            .downloader
            .download_chapter(&chapter.images, &temp_path, context, sink, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(chapter = title, error = %e, "chapter download could not start");
                summary.failed += 1;
                return;
            }
        };

        if !outcome.all_success() {
            warn!(
                chapter = title,
                failed = outcome.failed_count(),
                "chapter incomplete, temp directory kept for resume"
            );
            summary.failed += 1;
            return;
        }

        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            warn!(
                chapter = title,
                path = %final_path.display(),
                "rename target already exists, leaving temp directory"
            );
            summary.failed += 1;
            return;
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            warn!(chapter = title, error = %e, "cannot rename temp directory");
            summary.failed += 1;
            return;
        }

        summary.succeeded += 1;
        info!(chapter = title, "chapter complete");

        // Archiving is best-effort: the pages are safely in place either way.
        if let Err(e) = self.archiver.archive(&final_path, self.config.format) {
            warn!(chapter = title, error = %e, "archiving failed, directory kept");
        }

        if self.config.delete_on_success {
            self.prune_chapter(chapter).await;
        }
    }

    async fn prune_chapter(&mut self, chapter: &Chapter) {
        if !self.document.remove_chapter(chapter) {
            warn!("chapter not found in document, nothing to prune");
            return;
        }
        if let Err(e) = self.document.persist(&self.config.document_path).await {
            warn!(error = %e, "cannot persist pruned document");
        }
    }
}

/// Derives the cover filename from the URL path extension (`cover.jpg` when
/// the URL carries none).
fn cover_filename(url: &str) -> String {
    let extension = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_owned))
        })
        .and_then(|segment| {
            segment
                .rfind('.')
                .map(|dot| segment[dot + 1..].to_lowercase())
                .filter(|e| !e.is_empty() && e.len() <= 5)
        })
        .unwrap_or_else(|| "jpg".to_string());
    format!("cover.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_filename_from_url() {
        assert_eq!(cover_filename("https://cdn.example.com/c/cover.webp"), "cover.webp");
        assert_eq!(cover_filename("https://cdn.example.com/c/cover.PNG?x=1"), "cover.png");
        assert_eq!(cover_filename("https://cdn.example.com/no-ext"), "cover.jpg");
    }
}
