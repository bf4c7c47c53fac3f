//! CLI entry point for the manga download manager.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mangadm_core::{
    BatchDownloader, ChapterOrchestrator, HttpClient, OrchestratorConfig, ProgressSink,
    RetryPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod progress_ui;

use cli::Args;
use progress_ui::ConsoleProgress;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let is_json = args
        .json_file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        bail!(
            "unsupported file format: {}. Please use a JSON file.",
            args.json_file.display()
        );
    }

    let client = HttpClient::new();
    let retry_policy = RetryPolicy::with_max_attempts(u32::from(args.max_retries));
    let downloader = BatchDownloader::new(client, retry_policy, usize::from(args.concurrency))?;

    let config = OrchestratorConfig {
        document_path: args.json_file.clone(),
        dest: args.dest.clone(),
        limit: args.limit.map(|l| usize::try_from(l).unwrap_or(usize::MAX)),
        delete_on_success: args.delete_on_success,
        update_details: args.update_details,
        format: args.format,
    };

    let mut orchestrator = ChapterOrchestrator::new(config, downloader)
        .await
        .with_context(|| format!("cannot start run for {}", args.json_file.display()))?;

    info!(
        manga = orchestrator.document().details.title(),
        chapters = orchestrator.document().chapters.len(),
        output = %orchestrator.base_folder().display(),
        "starting download run"
    );

    // Ctrl-C cancels cooperatively: in-flight pages stop at the next chunk
    // and temp files stay on disk for the next run to resume.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let progress = Arc::new(ConsoleProgress::new(!args.no_progress && !args.quiet));
    let sink: Arc<dyn ProgressSink> = progress.clone();

    let summary = orchestrator.run(&sink, &cancel).await?;
    progress.finish();

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        "Download complete"
    );

    if summary.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
