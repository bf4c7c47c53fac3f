//! Per-item results and per-chapter batch outcome.

use std::path::PathBuf;

use super::error::DownloadError;

/// Terminal status of one item in a batch. Retries collapse into exactly
/// one of these per item per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The file was downloaded and renamed into place.
    Success,
    /// All attempts failed; the partial temp file may remain for resume.
    Failed,
    /// The destination already existed; no request was issued.
    Skipped,
    /// The remote resource is gone; a placeholder was written instead.
    /// Counts as resolved, not as failure.
    Replaced,
}

/// Terminal result for one attempted item.
#[derive(Debug)]
pub struct DownloadResult {
    /// How the item resolved.
    pub status: DownloadStatus,
    /// Destination path, when one was materialized (or pre-existed).
    pub path: Option<PathBuf>,
    /// The final error for FAILED (and the triggering error for REPLACED).
    pub error: Option<DownloadError>,
    /// The source URL.
    pub url: String,
}

impl DownloadResult {
    /// Builds a SUCCESS result.
    pub fn success(url: impl Into<String>, path: PathBuf) -> Self {
        Self {
            status: DownloadStatus::Success,
            path: Some(path),
            error: None,
            url: url.into(),
        }
    }

    /// Builds a SKIPPED result for a pre-existing destination.
    pub fn skipped(url: impl Into<String>, path: PathBuf) -> Self {
        Self {
            status: DownloadStatus::Skipped,
            path: Some(path),
            error: None,
            url: url.into(),
        }
    }

    /// Builds a REPLACED result for a placeholder substitution.
    pub fn replaced(url: impl Into<String>, path: PathBuf, error: DownloadError) -> Self {
        Self {
            status: DownloadStatus::Replaced,
            path: Some(path),
            error: Some(error),
            url: url.into(),
        }
    }

    /// Builds a FAILED result.
    pub fn failed(url: impl Into<String>, error: DownloadError) -> Self {
        Self {
            status: DownloadStatus::Failed,
            path: None,
            error: Some(error),
            url: url.into(),
        }
    }

    /// True when the item is resolved: present on disk or deliberately
    /// substituted.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Success | DownloadStatus::Skipped | DownloadStatus::Replaced
        )
    }
}

/// Aggregated results for one chapter's batch, ordered by page index.
///
/// The batch never fails as a unit; partial failure lives in the
/// individual results.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    results: Vec<DownloadResult>,
}

impl BatchOutcome {
    /// Wraps index-ordered results.
    #[must_use]
    pub fn new(results: Vec<DownloadResult>) -> Self {
        Self { results }
    }

    /// The per-item results in page order.
    #[must_use]
    pub fn results(&self) -> &[DownloadResult] {
        &self.results
    }

    /// True when every item resolved (SUCCESS, SKIPPED, or REPLACED).
    /// An empty outcome is not a success.
    #[must_use]
    pub fn all_success(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(DownloadResult::is_resolved)
    }

    fn count(&self, status: DownloadStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of SUCCESS results.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.count(DownloadStatus::Success)
    }

    /// Number of FAILED results.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(DownloadStatus::Failed)
    }

    /// Number of SKIPPED results.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(DownloadStatus::Skipped)
    }

    /// Number of REPLACED results.
    #[must_use]
    pub fn replaced_count(&self) -> usize {
        self.count(DownloadStatus::Replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(url: &str) -> DownloadResult {
        DownloadResult::success(url, PathBuf::from("/out/01.jpg"))
    }

    #[test]
    fn test_empty_outcome_is_not_all_success() {
        assert!(!BatchOutcome::default().all_success());
    }

    #[test]
    fn test_replaced_counts_as_resolved() {
        let outcome = BatchOutcome::new(vec![
            success("http://e/1.jpg"),
            DownloadResult::replaced(
                "http://e/2.jpg",
                PathBuf::from("/out/02.jpg"),
                DownloadError::http_status("http://e/2.jpg", 404),
            ),
            DownloadResult::skipped("http://e/3.jpg", PathBuf::from("/out/03.jpg")),
        ]);
        assert!(outcome.all_success());
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.replaced_count(), 1);
        assert_eq!(outcome.skipped_count(), 1);
        assert_eq!(outcome.failed_count(), 0);
    }

    #[test]
    fn test_single_failure_breaks_all_success() {
        let outcome = BatchOutcome::new(vec![
            success("http://e/1.jpg"),
            DownloadResult::failed("http://e/2.jpg", DownloadError::timeout("http://e/2.jpg")),
            success("http://e/3.jpg"),
        ]);
        assert!(!outcome.all_success());
        assert_eq!(outcome.failed_count(), 1);
    }
}
