//! Error types for calls against the remote signature API.

use thiserror::Error;

/// Maximum number of response-body characters kept in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors returned by a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The API rejected the bearer credential (HTTP 401).
    #[error("[AUTH] API rejected the token (HTTP 401) requesting {url}")]
    Unauthorized {
        /// The URL that was rejected.
        url: String,
    },

    /// Any other non-2xx response.
    #[error("HTTP {status} requesting {url}{}", format_body(body.as_deref()))]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
        /// Leading part of the response body, if any.
        body: Option<String>,
    },

    /// A 2xx response whose JSON body could not be decoded.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL cannot be joined with an endpoint path.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl ApiError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(url: impl Into<String>) -> Self {
        Self::Unauthorized { url: url.into() }
    }

    /// Creates an HTTP status error without header or body context.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
            body: None,
        }
    }

    /// Creates an HTTP status error carrying the Retry-After header and a body excerpt.
    pub fn http_status_with_context(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
        body: Option<&str>,
    ) -> Self {
        let body = body
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| b.chars().take(BODY_EXCERPT_CHARS).collect());
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
            body,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true when the credential itself was rejected.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

fn format_body(body: Option<&str>) -> String {
    body.map(|b| format!(": {b}")).unwrap_or_default()
}
