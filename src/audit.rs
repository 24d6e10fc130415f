//! Append-only CSV log with one row per attempted document download.
//!
//! A new log starts with a UTF-8 byte-order mark, so spreadsheet tools pick
//! the right encoding for non-Latin names, followed by the header row. An
//! existing log is appended to as-is. Every row is flushed before
//! [`AuditLog::append`] returns.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::ArchiveError;

/// UTF-8 byte-order mark written at the start of a new log.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column names, in order.
pub const LOG_HEADER: [&str; 8] = [
    "signature_id",
    "document_id",
    "email_used",
    "original_filename",
    "saved_path",
    "created_at",
    "status",
    "error",
];

/// Outcome of one download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// The document was saved.
    Success,
    /// The attempt failed; see the error column.
    Failure,
}

/// One row of the download log. Field order matches [`LOG_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub signature_id: String,
    pub document_id: String,
    pub email_used: String,
    pub original_filename: String,
    /// Empty when the attempt failed.
    pub saved_path: String,
    pub created_at: String,
    pub status: LogStatus,
    /// Empty when the attempt succeeded.
    pub error: String,
}

/// Writer for `download_log.csv`.
pub struct AuditLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows_written: usize,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Opens the log for appending, creating it (with BOM and header) if it
    /// does not exist or is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::AuditLog`] if the file cannot be created or the
    /// header cannot be written.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::audit_log(&path, e.into()))?;
        }

        let is_new = std::fs::metadata(&path).map_or(true, |meta| meta.len() == 0);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchiveError::audit_log(&path, e.into()))?;

        if is_new {
            file.write_all(UTF8_BOM)
                .map_err(|e| ArchiveError::audit_log(&path, e.into()))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer
                .write_record(LOG_HEADER)
                .and_then(|()| writer.flush().map_err(csv::Error::from))
                .map_err(|e| ArchiveError::audit_log(&path, e))?;
            debug!(path = %path.display(), "created download log");
        }

        Ok(Self {
            path,
            writer,
            rows_written: 0,
        })
    }

    /// Appends one row and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::AuditLog`] if the row cannot be written.
    pub fn append(&mut self, entry: &LogEntry) -> Result<(), ArchiveError> {
        self.writer
            .serialize(entry)
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| ArchiveError::audit_log(&self.path, e))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows appended through this handle.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
