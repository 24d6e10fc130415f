//! Request spacing for calls against the signature API.
//!
//! All traffic goes to a single API host, so the [`RateLimiter`] keeps one
//! "last request" timestamp and enforces a minimum interval between
//! consecutive calls. It is `Send + Sync` and can be shared through an `Arc`
//! if per-record workers are ever introduced.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use signature_downloader_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(200));
//!
//! // First request proceeds immediately
//! limiter.acquire().await;
//!
//! // Second request waits until 200ms have passed since the first
//! limiter.acquire().await;
//! # }
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Upper bound on any server-requested wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Minimum-interval limiter for API requests.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum delay between consecutive requests.
    min_interval: Duration,

    /// Time of the last request. `None` until the first request.
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `min_interval` between requests.
    ///
    /// A zero interval behaves like [`RateLimiter::disabled`].
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = min_interval.as_millis()))]
    pub fn new(min_interval: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Creates a limiter that applies no delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether spacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.min_interval.is_zero()
    }

    /// Returns the configured minimum interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request may be issued, then records it.
    ///
    /// The first request proceeds immediately.
    pub async fn acquire(&self) {
        if self.is_disabled() {
            return;
        }

        let mut last_request_guard = self.last_request.lock().await;

        if let Some(last_request) = *last_request_guard {
            let elapsed = last_request.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval.saturating_sub(elapsed);
                debug!(delay_ms = delay.as_millis(), "applying rate limit delay");
                tokio::time::sleep(delay).await;
            }
        }

        *last_request_guard = Some(Instant::now());
    }
}

/// Converts a `Retry-After` value into the wait it asks for.
///
/// Accepts delta-seconds (`120`) or an HTTP-date
/// (`Wed, 21 Oct 2025 07:28:00 GMT`). A date in the past means no wait.
/// Waits longer than an hour are capped; anything else unparseable is `None`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use signature_downloader_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "ignoring negative Retry-After");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "server asked for a longer wait than allowed, capping"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "ignoring unparseable Retry-After");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) if duration > MAX_RETRY_AFTER => {
            warn!(
                delay_secs = duration.as_secs(),
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "server asked for a wait past the allowed maximum, capping"
            );
            Some(MAX_RETRY_AFTER)
        }
        Ok(duration) => Some(duration),
        // Date is in the past
        Err(_) => Some(Duration::ZERO),
    }
}
