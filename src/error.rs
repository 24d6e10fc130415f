//! Error taxonomy for an archive run.
//!
//! Only [`ArchiveError::Unauthorized`], [`ArchiveError::Listing`],
//! [`ArchiveError::Config`] and [`ArchiveError::AuditLog`] end a run. The
//! other variants describe the failure of a single (signature, document) unit
//! and end up as a failure row in the download log.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

/// Errors produced by the archive pipeline.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The API rejected the credential. Aborts the run.
    #[error("authentication failed, check the API token: {source}")]
    Unauthorized {
        /// The rejected call.
        #[source]
        source: ApiError,
    },

    /// Listing signatures failed after retries. Aborts the run.
    #[error("listing signatures failed: {source}")]
    Listing {
        /// The failed page fetch.
        #[source]
        source: ApiError,
    },

    /// Fetching signature detail failed after retries.
    #[error("fetching detail for signature {signature_id} failed: {source}")]
    Detail {
        /// Signature whose detail could not be fetched.
        signature_id: String,
        /// The failed call.
        #[source]
        source: ApiError,
    },

    /// Fetching a document's signed content failed after retries.
    #[error("downloading document {document_id} of signature {signature_id} failed: {source}")]
    Download {
        /// Owning signature.
        signature_id: String,
        /// Document that could not be fetched.
        document_id: String,
        /// The failed call.
        #[source]
        source: ApiError,
    },

    /// Local file system error (create directory, write file).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The download log could not be opened or written.
    #[error("download log error at {path}: {source}")]
    AuditLog {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The run configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an audit log error.
    pub fn audit_log(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::AuditLog {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error must stop the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::Listing { .. }
                | Self::AuditLog { .. }
                | Self::Config(_)
        )
    }

    /// Returns true if the API rejected the credential at any stage.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Listing { source }
            | Self::Detail { source, .. }
            | Self::Download { source, .. } => source.is_unauthorized(),
            Self::Io { .. } | Self::AuditLog { .. } | Self::Config(_) => false,
        }
    }

    /// Lifts a unit failure caused by a rejected credential into
    /// [`ArchiveError::Unauthorized`]. Other errors are returned unchanged.
    #[must_use]
    pub fn into_auth_abort(self) -> Self {
        match self {
            Self::Listing { source }
            | Self::Detail { source, .. }
            | Self::Download { source, .. }
                if source.is_unauthorized() =>
            {
                Self::Unauthorized { source }
            }
            other => other,
        }
    }
}
