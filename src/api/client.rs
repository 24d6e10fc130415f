//! reqwest-backed implementation of [`SignatureApi`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};
use url::Url;

use super::{ApiError, DetailRecord, DocumentBody, SignatureApi, SignatureRecord};
use crate::config::{CONNECT_TIMEOUT_SECS, DateRange, READ_TIMEOUT_SECS};
use crate::user_agent::default_user_agent;

/// HTTP client for the Signaturit v3 REST API.
///
/// Created once per run and reused for every request, taking advantage of
/// connection pooling. The bearer token is attached to each request and never
/// appears in `Debug` output.
#[derive(Clone)]
pub struct SignaturitClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for SignaturitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignaturitClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SignaturitClient {
    /// Creates a client with default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` does not parse, or
    /// [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, token, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_timeouts(
        base_url: &str,
        token: impl Into<String>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| ApiError::invalid_url(base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::invalid_url(base_url.as_str()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .map_err(|e| ApiError::network(base_url.as_str(), e))?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Returns the base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::invalid_url(self.base_url.as_str()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ApiError> {
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transfer_error(&url_str, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        if status_code == 401 {
            return Err(ApiError::unauthorized(url_str));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let body = response.text().await.ok();
        debug!(status = status_code, url = %url_str, "API returned error status");
        Err(ApiError::http_status_with_context(
            url_str,
            status_code,
            retry_after,
            body.as_deref(),
        ))
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, ApiError> {
        let url_str = url.to_string();
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transfer_error(&url_str, e))?;
        Ok(bytes.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let url_str = url.to_string();
        let bytes = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(url_str, e))
    }
}

#[async_trait]
impl SignatureApi for SignaturitClient {
    #[instrument(skip(self), fields(since = %range.since, until = %range.until))]
    async fn list_signatures(
        &self,
        range: &DateRange,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SignatureRecord>, ApiError> {
        let mut url = self.endpoint(&["signatures.json"])?;
        url.query_pairs_mut()
            .append_pair("status", "completed")
            .append_pair("since", &range.since.to_string())
            .append_pair("until", &range.until.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn signature_detail(&self, signature_id: &str) -> Result<DetailRecord, ApiError> {
        let url = self.endpoint(&["signatures", &format!("{signature_id}.json")])?;
        let payload = self.get_json(url).await?;
        Ok(DetailRecord {
            signature_id: signature_id.to_string(),
            payload,
        })
    }

    #[instrument(skip(self))]
    async fn download_signed_document(
        &self,
        signature_id: &str,
        document_id: &str,
    ) -> Result<DocumentBody, ApiError> {
        let url = self.endpoint(&[
            "signatures",
            signature_id,
            "documents",
            document_id,
            "download",
            "signed",
        ])?;
        let url_str = url.to_string();
        let response = self.get(url).await?;
        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(move |e| transfer_error(&url_str, e))
            .boxed())
    }
}

/// Maps a failure while sending a request or reading its body.
fn transfer_error(url: &str, error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout(url)
    } else {
        ApiError::network(url, error)
    }
}
