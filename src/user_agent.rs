//! User-Agent string sent with every API request.

/// Default User-Agent for API requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("signature-downloader/{version} (yearly-archive)")
}
