//! Failure classification and retry policy for page transfers.
//!
//! Every failed attempt is classified into a [`FailureKind`] and fed to the
//! [`RetryPolicy`], which answers with a [`RetryDecision`]:
//!
//! - [`RetryDecision::Retry`] — transient network trouble and server errors
//!   are retried with exponential backoff and jitter, resuming from the
//!   bytes already on disk.
//! - [`RetryDecision::Replace`] — 401/403/404 mean the page is gone for
//!   good; a placeholder image is written so the chapter can still be
//!   archived with a visible broken-page marker instead of staying
//!   incomplete forever.
//! - [`RetryDecision::Abort`] — local IO failures, cancellation, and
//!   exhausted retries terminate the item as FAILED.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::error::DownloadError;

/// Default maximum attempts per item (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default exponential base: the delay before attempt `n+1` is `base^n`.
const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Default cap on the backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Classification of a failed transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// May succeed on retry: connection errors, timeouts, decode errors,
    /// and HTTP 5xx / 408 / 429 responses.
    Transient,

    /// The resource is permanently unavailable (HTTP 401, 403, 404).
    /// Substituted with a placeholder rather than retried.
    Gone,

    /// Retrying cannot help: local IO failure, invalid URL, cancellation.
    Fatal,
}

/// Decision for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay, resuming from the on-disk offset.
    Retry {
        /// How long to sleep before the next attempt.
        delay: Duration,
        /// The attempt number about to run (1-indexed).
        attempt: u32,
    },

    /// Write the placeholder payload and report the item as REPLACED.
    Replace,

    /// Stop attempting the item and report it as FAILED.
    Abort {
        /// Human-readable reason, surfaced in logs.
        reason: String,
    },
}

/// Exponential backoff policy with jitter.
///
/// Delay before retrying attempt `n` is
/// `min(base^n, cap) + uniform(0, 0.5 * min(base^n, cap))`.
/// With the defaults (base 2, cap 30s) the base delays run 2s, 4s, 8s, ...
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_BACKOFF_BASE,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is clamped to
    /// at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max_delay,
        }
    }

    /// Creates a policy with a custom attempt budget and default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the configured attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after attempt number `attempt` (1-indexed) failed
    /// with a failure of kind `kind`.
    pub fn decide(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
        match kind {
            FailureKind::Gone => return RetryDecision::Replace,
            FailureKind::Fatal => {
                return RetryDecision::Abort {
                    reason: "unrecoverable failure".to_string(),
                };
            }
            FailureKind::Transient => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "attempt budget exhausted");
            return RetryDecision::Abort {
                reason: format!("all {} attempts exhausted", self.max_attempts),
            };
        }

        let delay = self.delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Backoff delay for `attempt` without jitter: `min(base^attempt, cap)`.
    ///
    /// Exposed so tests can assert monotonicity without randomness.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let raw = self.base.powi(attempt.min(64) as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Jittered delay for `attempt`: base delay plus uniform(0, 0.5 * base).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_secs = rand::thread_rng().gen_range(0.0..=0.5 * base.as_secs_f64());
        base + Duration::from_secs_f64(jitter_secs)
    }
}

/// Classifies a transfer error for the retry policy.
///
/// | Error | Kind |
/// |-------|------|
/// | HTTP 401 / 403 / 404 | Gone |
/// | HTTP 408 / 429 / 5xx / other 4xx | Transient |
/// | Timeout, network, decode | Transient |
/// | Local IO | Fatal |
/// | Invalid URL | Fatal |
/// | Cancelled, dead task | Fatal |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureKind {
    match error {
        DownloadError::HttpStatus { status, .. } => match status {
            401 | 403 | 404 => FailureKind::Gone,
            _ => FailureKind::Transient,
        },
        DownloadError::Network { .. } | DownloadError::Timeout { .. } => FailureKind::Transient,
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Cancelled { .. }
        | DownloadError::TaskAborted { .. } => FailureKind::Fatal,
    }
}
