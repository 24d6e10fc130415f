//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use signature_downloader_core::config::{
    DEFAULT_OUTPUT_ROOT, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_INTERVAL_MS, MAX_PAGE_SIZE,
    PRODUCTION_BASE_URL,
};
use signature_downloader_core::DEFAULT_MAX_ATTEMPTS;

/// Archive a year of signed documents from Signaturit.
///
/// Every completed signature created in the given year is listed, its signed
/// documents are saved as `<email>_<original name>.pdf` under
/// `<output-dir>/<year>/`, and each attempt is recorded in
/// `download_log.csv`.
#[derive(Parser, Debug)]
#[command(name = "signature-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Calendar year to archive (e.g. 2024)
    #[arg(short = 'y', long, value_parser = clap::value_parser!(i32).range(2000..=9999))]
    pub year: i32,

    /// Directory under which `<year>/` is created
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_ROOT)]
    pub output_dir: PathBuf,

    /// API base URL, including the version segment
    #[arg(long, default_value = PRODUCTION_BASE_URL, conflicts_with = "sandbox")]
    pub base_url: String,

    /// Use the sandbox environment instead of production
    #[arg(long)]
    pub sandbox: bool,

    /// Signatures requested per listing page (1-100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE as u16, value_parser = clap::value_parser!(u16).range(1..=MAX_PAGE_SIZE as i64))]
    pub page_size: u16,

    /// API token (bearer credential)
    #[arg(long, env = "SIGNATURIT_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Maximum attempts per remote call, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Minimum delay between API requests in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = DEFAULT_REQUEST_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Base URL after applying `--sandbox`.
    pub fn effective_base_url(&self) -> &str {
        if self.sandbox {
            signature_downloader_core::SANDBOX_BASE_URL
        } else {
            &self.base_url
        }
    }
}
