//! Drives one archive run: list, resolve identity, name, download, log.
//!
//! Records are processed one at a time. Every (signature, document) pair
//! produces exactly one row in the download log, whatever its outcome. A
//! failed unit never stops the run; a rejected credential or a listing that
//! fails after retries does.

use std::path::Path;
use std::pin::pin;
use std::sync::Arc;

use futures_util::TryStreamExt;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{DocumentRef, SignatureApi, SignatureRecord, SignaturitClient};
use crate::audit::{AuditLog, LogEntry, LogStatus};
use crate::config::{ArchiveConfig, diagnostics_dir_in};
use crate::download::{
    RateLimiter, RetryExecutor, build_target_filename, download_document, resolve_unique_path,
};
use crate::error::ArchiveError;
use crate::identity::{ResolvedIdentity, resolve_identity};
use crate::listing::SignatureLister;

/// Counters for a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    signatures: usize,
    downloaded: usize,
    failed: usize,
    bytes: u64,
}

impl RunSummary {
    /// Signatures yielded by the listing.
    #[must_use]
    pub fn signatures(&self) -> usize {
        self.signatures
    }

    /// Documents saved to disk.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    /// Documents logged as failures.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Bytes written across all saved documents.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Rows written to the download log (downloaded + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.failed
    }
}

/// Per-run state shared by every unit of work.
struct RunContext<'a> {
    executor: &'a RetryExecutor,
    year_dir: &'a Path,
    diagnostics_dir: &'a Path,
    log: AuditLog,
    summary: RunSummary,
}

impl RunContext<'_> {
    fn record_success(
        &mut self,
        record: &SignatureRecord,
        document: &DocumentRef,
        identity: &ResolvedIdentity,
        saved_path: &Path,
        bytes: u64,
    ) -> Result<(), ArchiveError> {
        self.log.append(&LogEntry {
            signature_id: record.id.clone(),
            document_id: document.id.clone(),
            email_used: identity.as_str().to_string(),
            original_filename: document.original_filename(),
            saved_path: saved_path.display().to_string(),
            created_at: record.created_at.clone(),
            status: LogStatus::Success,
            error: String::new(),
        })?;
        self.summary.downloaded += 1;
        self.summary.bytes += bytes;
        Ok(())
    }

    fn record_failure(
        &mut self,
        record: &SignatureRecord,
        document: &DocumentRef,
        identity: Option<&ResolvedIdentity>,
        failure: &ArchiveError,
    ) -> Result<(), ArchiveError> {
        self.log.append(&LogEntry {
            signature_id: record.id.clone(),
            document_id: document.id.clone(),
            email_used: identity.map(|i| i.as_str().to_string()).unwrap_or_default(),
            original_filename: document.original_filename(),
            saved_path: String::new(),
            created_at: record.created_at.clone(),
            status: LogStatus::Failure,
            error: failure.to_string(),
        })?;
        self.summary.failed += 1;
        Ok(())
    }
}

/// Archives one year of signed documents into the configured output root.
///
/// # Example
///
/// ```no_run
/// use signature_downloader_core::{ArchiveConfig, Archiver};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ArchiveConfig::new(2024, "token").with_output_root("./archive");
/// let summary = Archiver::from_config(config)?.run().await?;
/// println!("{} saved, {} failed", summary.downloaded(), summary.failed());
/// # Ok(())
/// # }
/// ```
pub struct Archiver {
    config: ArchiveConfig,
    api: Arc<dyn SignatureApi>,
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("year", &self.config.year)
            .field("output_root", &self.config.output_root)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl Archiver {
    /// Creates an archiver over any [`SignatureApi`] implementation.
    #[must_use]
    pub fn new(config: ArchiveConfig, api: Arc<dyn SignatureApi>) -> Self {
        Self { config, api }
    }

    /// Creates an archiver backed by the HTTP client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn from_config(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        config.validate()?;
        let client = SignaturitClient::new(&config.base_url, config.token.clone())
            .map_err(|e| ArchiveError::config(e.to_string()))?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Runs the archive to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Unauthorized`] as soon as the API rejects the
    /// token, after logging the unit in flight. Returns
    /// [`ArchiveError::Listing`] when a listing page fails after retries,
    /// [`ArchiveError::AuditLog`] when the log cannot be written, and
    /// [`ArchiveError::Config`] or [`ArchiveError::Io`] when the run cannot
    /// start. Failures of individual documents are logged, not returned.
    #[instrument(skip(self), fields(year = self.config.year))]
    pub async fn run(&self) -> Result<RunSummary, ArchiveError> {
        self.config.validate()?;
        let range = self.config.date_range()?;
        let year_dir = self.config.year_dir();
        tokio::fs::create_dir_all(&year_dir)
            .await
            .map_err(|e| ArchiveError::io(&year_dir, e))?;
        let diagnostics_dir = diagnostics_dir_in(&year_dir);

        let log = AuditLog::open(self.config.log_path())?;
        let executor = RetryExecutor::new(
            self.config.retry_policy.clone(),
            Arc::new(RateLimiter::new(self.config.request_interval)),
        );

        info!(
            since = %range.since,
            until = %range.until,
            output = %year_dir.display(),
            "starting archive run"
        );

        let mut ctx = RunContext {
            executor: &executor,
            year_dir: &year_dir,
            diagnostics_dir: &diagnostics_dir,
            log,
            summary: RunSummary::default(),
        };

        let lister =
            SignatureLister::new(self.api.as_ref(), &executor, range, self.config.page_size);
        let mut records = pin!(lister.records());

        loop {
            let record = match records.try_next().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(source) if source.is_unauthorized() => {
                    error!(error = %source, "listing rejected the API token");
                    return Err(ArchiveError::Unauthorized { source });
                }
                Err(source) => {
                    error!(error = %source, "listing failed after retries");
                    return Err(ArchiveError::Listing { source });
                }
            };
            ctx.summary.signatures += 1;
            self.archive_signature(&mut ctx, &record).await?;
        }

        let summary = ctx.summary;
        info!(
            signatures = summary.signatures,
            downloaded = summary.downloaded,
            failed = summary.failed,
            bytes = summary.bytes,
            "archive run complete"
        );
        Ok(summary)
    }

    /// Processes every document of one signature.
    ///
    /// Only fatal errors are returned; unit failures are logged.
    #[instrument(skip(self, ctx, record), fields(signature_id = %record.id))]
    async fn archive_signature(
        &self,
        ctx: &mut RunContext<'_>,
        record: &SignatureRecord,
    ) -> Result<(), ArchiveError> {
        let api = self.api.as_ref();

        let identity =
            match resolve_identity(api, ctx.executor, &record.id, ctx.diagnostics_dir).await {
                Ok((identity, _detail)) => identity,
                Err(e) => {
                    warn!(error = %e, documents = record.documents.len(), "detail fetch failed");
                    for document in &record.documents {
                        ctx.record_failure(record, document, None, &e)?;
                    }
                    return abort_on_auth(e);
                }
            };

        if record.documents.is_empty() {
            debug!("signature has no documents");
        }

        for document in &record.documents {
            let filename = build_target_filename(identity.as_str(), &document.original_filename());
            let destination = resolve_unique_path(ctx.year_dir, &filename);

            match download_document(api, ctx.executor, &record.id, &document.id, &destination)
                .await
            {
                Ok(bytes) => {
                    ctx.record_success(record, document, &identity, &destination, bytes)?;
                }
                Err(e) => {
                    warn!(document_id = %document.id, error = %e, "document download failed");
                    ctx.record_failure(record, document, Some(&identity), &e)?;
                    abort_on_auth(e)?;
                }
            }
        }

        Ok(())
    }
}

/// Turns a unit failure caused by a rejected token into a run abort.
fn abort_on_auth(failure: ArchiveError) -> Result<(), ArchiveError> {
    if failure.is_auth_failure() {
        error!(error = %failure, "API token rejected, aborting run");
        Err(failure.into_auth_abort())
    } else {
        Ok(())
    }
}
