//! Fetching a document's signed content and writing it to disk.

use std::io;
use std::path::Path;

use futures_util::TryStreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::RetryExecutor;
use crate::api::{ApiError, DocumentBody, SignatureApi};
use crate::error::ArchiveError;

/// Why streaming a body into a new file stopped.
#[derive(Debug)]
enum WriteFailure {
    /// The body stream failed; worth another attempt.
    Body(ApiError),
    /// The local file could not be created or written.
    Io(io::Error),
}

/// Downloads one document of a signature to `destination`.
///
/// The parent directory is created if needed. The destination is opened with
/// create-new semantics only once the API has accepted the request, so a
/// rejected fetch leaves no file behind. The body is streamed to disk chunk
/// by chunk. If the body breaks off, the partial file is removed and the
/// whole fetch is retried through `executor`; local write errors are not
/// retried.
///
/// # Returns
///
/// The number of bytes written.
///
/// # Errors
///
/// Returns [`ArchiveError::Download`] when the fetch fails (after retries) and
/// [`ArchiveError::Io`] when the directory or file cannot be written.
#[instrument(skip(api, executor), fields(destination = %destination.display()))]
pub async fn download_document(
    api: &dyn SignatureApi,
    executor: &RetryExecutor,
    signature_id: &str,
    document_id: &str,
    destination: &Path,
) -> Result<u64, ArchiveError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArchiveError::io(parent, e))?;
    }

    // Outer error: the API side, retried. Inner error: the local side, final.
    let written = executor
        .execute("download_signed_document", || async move {
            let body = api.download_signed_document(signature_id, document_id).await?;
            match write_new_file(destination, body).await {
                Ok(bytes) => Ok(Ok(bytes)),
                Err(WriteFailure::Body(e)) => Err(e),
                Err(WriteFailure::Io(e)) => Ok(Err(e)),
            }
        })
        .await
        .map_err(|source| ArchiveError::Download {
            signature_id: signature_id.to_string(),
            document_id: document_id.to_string(),
            source,
        })?;

    let bytes = written.map_err(|e| ArchiveError::io(destination, e))?;
    info!(bytes, "document saved");
    Ok(bytes)
}

/// Streams `body` into a file that must not exist yet.
///
/// The file is removed again if the body or the write fails.
async fn write_new_file(path: &Path, body: DocumentBody) -> Result<u64, WriteFailure> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(WriteFailure::Io)?;

    let result = stream_to_file(file, body).await;
    if let Err(failure) = &result {
        debug!(path = %path.display(), error = ?failure, "cleaning up partial file after error");
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "could not remove partial file");
        }
    }
    result
}

async fn stream_to_file(file: File, mut body: DocumentBody) -> Result<u64, WriteFailure> {
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.try_next().await.map_err(WriteFailure::Body)? {
        writer.write_all(&chunk).await.map_err(WriteFailure::Io)?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(WriteFailure::Io)?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(WriteFailure::Io)?;
    Ok(bytes_written)
}
