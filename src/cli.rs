//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mangadm_core::{ArchiveFormat, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

/// Download manga chapters described by a JSON document.
///
/// Chapters run sequentially; each chapter's pages download concurrently
/// with resume support. Finished chapters are packed into CBZ or EPUB.
#[derive(Parser, Debug)]
#[command(name = "mangadm")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the manga JSON file ({ "details": {...}, "chapters": [...] })
    pub json_file: PathBuf,

    /// Destination directory for the manga folder
    #[arg(short, long, default_value = ".")]
    pub dest: PathBuf,

    /// Stop after this many chapters have finished (succeeded or failed)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Remove each successfully downloaded chapter from the JSON file
    #[arg(long)]
    pub delete_on_success: bool,

    /// Rewrite details.json and re-fetch the cover even when present
    #[arg(short, long)]
    pub update_details: bool,

    /// Archive format for finished chapters
    #[arg(short, long, value_enum, default_value = "cbz")]
    pub format: ArchiveFormat,

    /// Maximum concurrent page downloads per chapter (1-64)
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: u8,

    /// Maximum attempts per page for transient failures (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
