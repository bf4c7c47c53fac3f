//! Error types for the download module.
//!
//! Each variant carries the context (URL or path) needed to classify the
//! failure and report it without re-deriving state at the call site.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while transferring a single file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset,
    /// chunked-transfer decode failures, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The transfer was interrupted by a cancellation request. The partial
    /// temp file is left on disk so a later run can resume it.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL whose transfer was cancelled.
        url: String,
    },

    /// The download task stopped without producing a result (worker panic
    /// or runtime shutdown).
    #[error("download task for {url} aborted: {reason}")]
    TaskAborted {
        /// The URL whose task died.
        url: String,
        /// What took the task down.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a dead-task error.
    pub fn task_aborted(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskAborted {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the error came from a cancellation request rather than a
    /// transfer failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// We intentionally do NOT implement `From<reqwest::Error>` or
// `From<std::io::Error>`: the variants require context (url, path) that the
// source errors don't carry. The helper constructors are the pattern here.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_includes_url() {
        let error = DownloadError::timeout("https://example.com/01.jpg");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/01.jpg"));
    }

    #[test]
    fn test_http_status_display() {
        let error = DownloadError::http_status("https://example.com/02.png", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("02.png"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_io_display_includes_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DownloadError::io(PathBuf::from("/tmp/ch/01.jpg_tmp"), io_error);
        assert!(error.to_string().contains("/tmp/ch/01.jpg_tmp"));
    }

    #[test]
    fn test_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"));
    }

    #[test]
    fn test_task_aborted_display_includes_reason() {
        let error = DownloadError::task_aborted("https://example.com/04.jpg", "panicked");
        let msg = error.to_string();
        assert!(msg.contains("04.jpg"), "Expected URL in: {msg}");
        assert!(msg.contains("panicked"), "Expected reason in: {msg}");
    }

    #[test]
    fn test_cancelled_is_cancelled() {
        let error = DownloadError::cancelled("https://example.com/03.jpg");
        assert!(error.is_cancelled());
        assert!(!DownloadError::timeout("x").is_cancelled());
    }
}
