//! Run configuration for the archiver.
//!
//! Every setting lives in an explicit [`ArchiveConfig`] value handed to the
//! [`Archiver`](crate::pipeline::Archiver), so a run can be driven with
//! injected settings and a mocked remote client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};

use crate::download::RetryPolicy;
use crate::error::ArchiveError;

/// Production API endpoint.
pub const PRODUCTION_BASE_URL: &str = "https://api.signaturit.com/v3";

/// Sandbox API endpoint.
pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.signaturit.com/v3";

/// Largest page the listing endpoint will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default page size (the remote maximum).
pub const DEFAULT_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "signaturit_downloads";

/// Default minimum spacing between remote calls, in milliseconds.
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 200;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Name of the download log inside the year directory.
pub const LOG_FILE_NAME: &str = "download_log.csv";

/// Name of the diagnostics subdirectory inside the year directory.
pub const DIAGNOSTICS_DIR_NAME: &str = "_no_email_samples";

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 9999;

/// Inclusive calendar date range used to filter the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First day included.
    pub since: NaiveDate,
    /// Last day included.
    pub until: NaiveDate,
}

impl DateRange {
    /// Builds the range covering `year`, relative to `today`.
    ///
    /// For the current year the range ends today; otherwise it ends on
    /// December 31st. Returns `None` for years chrono cannot represent.
    #[must_use]
    pub fn for_year(year: i32, today: NaiveDate) -> Option<Self> {
        let since = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let until = if year == today.year() {
            today
        } else {
            NaiveDate::from_ymd_opt(year, 12, 31)?
        };
        Some(Self { since, until })
    }
}

/// Settings for one archive run.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Calendar year to archive.
    pub year: i32,
    /// Directory under which `<year>/` is created.
    pub output_root: PathBuf,
    /// API base URL, including the version segment.
    pub base_url: String,
    /// Listing page size (1..=100).
    pub page_size: usize,
    /// Bearer token.
    pub token: String,
    /// Retry behavior for every remote call.
    pub retry_policy: RetryPolicy,
    /// Minimum spacing between consecutive remote calls. Zero disables spacing.
    pub request_interval: Duration,
}

impl ArchiveConfig {
    /// Creates a configuration with production defaults for `year`.
    #[must_use]
    pub fn new(year: i32, token: impl Into<String>) -> Self {
        Self {
            year,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            base_url: PRODUCTION_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            token: token.into(),
            retry_policy: RetryPolicy::default(),
            request_interval: Duration::from_millis(DEFAULT_REQUEST_INTERVAL_MS),
        }
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the minimum spacing between remote calls.
    #[must_use]
    pub fn with_request_interval(mut self, request_interval: Duration) -> Self {
        self.request_interval = request_interval;
        self
    }

    /// Checks the settings before a run starts.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] for an empty token, a page size
    /// outside `1..=100`, or an out-of-range year.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.token.trim().is_empty() {
            return Err(ArchiveError::config("API token is empty"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ArchiveError::config(format!(
                "page size {} must be between 1 and {MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(ArchiveError::config(format!(
                "year {} must be between {MIN_YEAR} and {MAX_YEAR}",
                self.year
            )));
        }
        Ok(())
    }

    /// Date range for the configured year, relative to the local date.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] if the year cannot be represented.
    pub fn date_range(&self) -> Result<DateRange, ArchiveError> {
        DateRange::for_year(self.year, Local::now().date_naive())
            .ok_or_else(|| ArchiveError::config(format!("year {} is out of range", self.year)))
    }

    /// Directory receiving this year's files.
    #[must_use]
    pub fn year_dir(&self) -> PathBuf {
        self.output_root.join(self.year.to_string())
    }

    /// Path of the download log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.year_dir().join(LOG_FILE_NAME)
    }

    /// Directory receiving detail payloads that yielded no signer email.
    #[must_use]
    pub fn diagnostics_dir(&self) -> PathBuf {
        diagnostics_dir_in(&self.year_dir())
    }

    /// Token suitable for log output.
    #[must_use]
    pub fn masked_token(&self) -> String {
        mask_token(&self.token)
    }
}

pub(crate) fn diagnostics_dir_in(year_dir: &Path) -> PathBuf {
    year_dir.join(DIAGNOSTICS_DIR_NAME)
}

/// Masks a token for display: first 6 and last 4 characters.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        len if len <= 12 => "<hidden>".to_string(),
        len => {
            let head: String = chars[..6].iter().collect();
            let tail: String = chars[len - 4..].iter().collect();
            format!("{head}...{tail}")
        }
    }
}
