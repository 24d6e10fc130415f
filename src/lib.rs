//! Signature Downloader Core Library
//!
//! Archives every signed document of a calendar year from the Signaturit
//! REST API into a local directory, naming files after the first signer's
//! email and recording each attempt in a CSV download log.
//!
//! # Architecture
//!
//! - [`api`] - Remote API contract ([`SignatureApi`]) and HTTP client
//! - [`download`] - Retry/backoff, request spacing, file naming and writing
//! - [`listing`] - Lazy offset pagination of a year's signatures
//! - [`identity`] - Signer email extraction with a `no_email` fallback
//! - [`audit`] - Append-only CSV download log
//! - [`pipeline`] - The [`Archiver`] driving a run end to end
//! - [`config`] - Run settings and derived paths

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod audit;
pub mod config;
pub mod download;
pub mod error;
pub mod identity;
pub mod listing;
pub mod pipeline;
mod user_agent;

// Re-export commonly used types
pub use api::{
    ApiError, DetailRecord, DocumentBody, SignatureApi, SignatureRecord, SignaturitClient,
};
pub use audit::{AuditLog, LogEntry, LogStatus};
pub use config::{ArchiveConfig, DateRange, PRODUCTION_BASE_URL, SANDBOX_BASE_URL};
pub use download::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RateLimiter, RetryDecision, RetryExecutor, RetryPolicy,
    classify_error,
};
pub use error::ArchiveError;
pub use identity::{NO_EMAIL, ResolvedIdentity};
pub use pipeline::{Archiver, RunSummary};
