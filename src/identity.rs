//! Signer identity resolution from a signature's detail payload.
//!
//! The identity is the email used to name downloaded files. It is taken from
//! the first signer entry carrying a plausible address, scanning `signers`,
//! then `recipients`, then `participants`, and looking at `email` before
//! `user.email` within each entry. When nothing matches, the identity is the
//! [`NO_EMAIL`] sentinel and the payload is saved under the diagnostics
//! directory so the structure can be inspected later.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api::{DetailRecord, SignatureApi};
use crate::download::{RetryExecutor, sanitize_filename};
use crate::error::ArchiveError;

/// Identity used when no signer email can be extracted.
pub const NO_EMAIL: &str = "no_email";

/// Payload keys scanned for signer entries, in priority order.
const SIGNER_LIST_KEYS: [&str; 3] = ["signers", "recipients", "participants"];

/// Shape check for an email address: `local@domain.tld`, no whitespace.
#[allow(clippy::expect_used)]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid") // Static pattern, safe to panic
});

/// Who signed a signature, as far as file naming is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedIdentity {
    /// First plausible signer email.
    Email(String),
    /// No email could be extracted.
    NoEmail,
}

impl ResolvedIdentity {
    /// The value used in filenames and the download log.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(email) => email,
            Self::NoEmail => NO_EMAIL,
        }
    }

    /// Returns true for the sentinel identity.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::NoEmail)
    }
}

impl fmt::Display for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracts the first plausible signer email from a detail payload.
#[must_use]
pub fn extract_signer_email(payload: &Value) -> Option<String> {
    SIGNER_LIST_KEYS
        .iter()
        .filter_map(|key| payload.get(key).and_then(Value::as_array))
        .flatten()
        .find_map(email_of_entry)
}

fn email_of_entry(entry: &Value) -> Option<String> {
    let direct = entry.get("email");
    let nested = entry.get("user").and_then(|user| user.get("email"));
    [direct, nested]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|candidate| EMAIL_PATTERN.is_match(candidate))
        .map(str::to_string)
}

/// Derives the identity for an already-fetched detail payload.
#[must_use]
pub fn identity_from_detail(detail: &DetailRecord) -> ResolvedIdentity {
    extract_signer_email(&detail.payload).map_or(ResolvedIdentity::NoEmail, ResolvedIdentity::Email)
}

/// Fetches a signature's detail and resolves its identity.
///
/// When the sentinel is produced, the raw payload is written to
/// `diagnostics_dir/<signature_id>.json` on a best-effort basis.
///
/// # Errors
///
/// Returns [`ArchiveError::Detail`] when the detail fetch fails after retries.
/// Diagnostic write failures are logged and never returned.
#[instrument(skip(api, executor, diagnostics_dir))]
pub async fn resolve_identity(
    api: &dyn SignatureApi,
    executor: &RetryExecutor,
    signature_id: &str,
    diagnostics_dir: &Path,
) -> Result<(ResolvedIdentity, DetailRecord), ArchiveError> {
    let detail = executor
        .execute("signature_detail", || api.signature_detail(signature_id))
        .await
        .map_err(|source| ArchiveError::Detail {
            signature_id: signature_id.to_string(),
            source,
        })?;

    let identity = identity_from_detail(&detail);
    if identity.is_sentinel() {
        info!("no signer email found in detail payload");
        save_diagnostic(diagnostics_dir, &detail).await;
    } else {
        debug!(identity = %identity, "resolved signer email");
    }

    Ok((identity, detail))
}

/// Writes the detail payload for later inspection. Never fails the caller,
/// and keeps an existing sample for the same signature.
pub async fn save_diagnostic(diagnostics_dir: &Path, detail: &DetailRecord) -> Option<PathBuf> {
    let path = diagnostics_dir.join(sanitize_filename(&format!("{}.json", detail.signature_id)));
    if path.exists() {
        debug!(path = %path.display(), "diagnostic sample already present");
        return None;
    }

    let contents = match serde_json::to_vec_pretty(&detail.payload) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(error = %e, "could not serialize detail payload for diagnostics");
            return None;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(diagnostics_dir).await {
        warn!(dir = %diagnostics_dir.display(), error = %e, "could not create diagnostics directory");
        return None;
    }
    if let Err(e) = tokio::fs::write(&path, contents).await {
        warn!(path = %path.display(), error = %e, "could not write diagnostic sample");
        return None;
    }

    debug!(path = %path.display(), "saved diagnostic sample");
    Some(path)
}
