//! CLI entry point for the signature downloader.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use signature_downloader_core::{
    ArchiveConfig, ArchiveError, Archiver, RetryPolicy, RunSummary, SignaturitClient,
};
use tracing::{debug, error, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

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

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(summary) => {
            if summary.failed() > 0 {
                info!(
                    failed = summary.failed(),
                    "some documents failed, see the download log for details"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            if e
                .downcast_ref::<ArchiveError>()
                .is_some_and(ArchiveError::is_auth_failure)
            {
                error!("the API token was rejected; check SIGNATURIT_API_TOKEN or --token");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<RunSummary> {
    let config = ArchiveConfig::new(args.year, args.token.clone())
        .with_output_root(args.output_dir.clone())
        .with_base_url(args.effective_base_url())
        .with_page_size(usize::from(args.page_size))
        .with_retry_policy(RetryPolicy::with_max_attempts(u32::from(args.max_retries)))
        .with_request_interval(Duration::from_millis(args.rate_limit));
    config.validate()?;

    debug!(
        year = config.year,
        base_url = %config.base_url,
        token = %config.masked_token(),
        page_size = config.page_size,
        rate_limit_ms = args.rate_limit,
        "configuration loaded"
    );
    info!(year = config.year, output = %config.year_dir().display(), "Signature downloader starting");

    let client = SignaturitClient::new(&config.base_url, config.token.clone())
        .with_context(|| format!("cannot use API base URL {}", config.base_url))?;
    let log_path = config.log_path();
    let archiver = Archiver::new(config, Arc::new(client));

    let summary = archiver.run().await?;

    info!(
        signatures = summary.signatures(),
        downloaded = summary.downloaded(),
        failed = summary.failed(),
        bytes = summary.bytes(),
        "Download complete"
    );
    println!(
        "Downloaded {} of {} documents ({} failed). Log: {}",
        summary.downloaded(),
        summary.total(),
        summary.failed(),
        log_path.display()
    );

    Ok(summary)
}
