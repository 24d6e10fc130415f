//! Remote signature API contract and its HTTP implementation.
//!
//! The pipeline only talks to the remote service through the [`SignatureApi`]
//! trait, so tests can substitute a scripted implementation or point a
//! [`SignaturitClient`] at a mock server.
//!
//! # Endpoints
//!
//! - `GET /signatures.json` - paginated listing (offset/limit)
//! - `GET /signatures/{id}.json` - full detail including signers
//! - `GET /signatures/{id}/documents/{document_id}/download/signed` - signed PDF body, streamed

mod client;
mod error;
mod types;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::DateRange;

pub use client::SignaturitClient;
pub use error::ApiError;
pub use types::{DetailRecord, DocumentFile, DocumentRef, SignatureRecord};

/// Body of a signed document, yielded in chunks as it arrives.
pub type DocumentBody = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// Operations the pipeline needs from the remote service.
///
/// Each method performs exactly one request; retrying is the caller's job.
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn SignatureApi>`.
#[async_trait]
pub trait SignatureApi: Send + Sync {
    /// Fetches one page of completed signatures created within `range`.
    async fn list_signatures(
        &self,
        range: &DateRange,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SignatureRecord>, ApiError>;

    /// Fetches the full detail payload for a signature.
    async fn signature_detail(&self, signature_id: &str) -> Result<DetailRecord, ApiError>;

    /// Starts fetching the signed binary content of one document.
    ///
    /// Resolves once the response status is known; the body follows as a
    /// stream and may still fail part way through.
    async fn download_signed_document(
        &self,
        signature_id: &str,
        document_id: &str,
    ) -> Result<DocumentBody, ApiError>;
}
