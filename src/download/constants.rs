//! Shared constants for the download module.

/// Connection timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout in seconds (generous for large pages on slow mirrors).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Suffix appended to a destination filename while its transfer is in
/// flight. The suffixed file is renamed onto the destination only after the
/// full byte stream has been consumed.
pub const TEMP_SUFFIX: &str = "_tmp";

/// Default number of pages fetched concurrently within one chapter.
pub const DEFAULT_CONCURRENCY: usize = 4;
