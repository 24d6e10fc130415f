//! Remote-call resilience and local file handling for signed documents.
//!
//! # Features
//!
//! - Exponential backoff with jitter for rate limits (429) and server errors (5xx)
//! - Retry-After support for rate-limited responses
//! - Minimum spacing between consecutive API calls
//! - Deterministic `{email}_{original}.pdf` naming with `_2`, `_3`, ... on collision
//! - Create-new writes streamed chunk by chunk, with cleanup of partial files
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use signature_downloader_core::api::SignaturitClient;
//! use signature_downloader_core::download::{
//!     RateLimiter, RetryExecutor, RetryPolicy, build_target_filename, download_document,
//!     resolve_unique_path,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SignaturitClient::new("https://api.signaturit.com/v3", "token")?;
//! let executor = RetryExecutor::new(RetryPolicy::default(), Arc::new(RateLimiter::disabled()));
//! let dir = Path::new("./signaturit_downloads/2024");
//! let path = resolve_unique_path(dir, &build_target_filename("a@x.com", "contract.pdf"));
//! let bytes = download_document(&client, &executor, "sig-id", "doc-id", &path).await?;
//! println!("saved {bytes} bytes to {}", path.display());
//! # Ok(())
//! # }
//! ```

mod filename;
pub mod rate_limiter;
mod retry;
mod writer;

pub use filename::{
    MAX_FILENAME_BYTES, build_target_filename, resolve_unique_path, sanitize_filename,
};
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryExecutor, RetryPolicy, RetryState,
    classify_error,
};
pub use writer::download_document;
