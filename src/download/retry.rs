//! Retry logic with exponential backoff for transient API failures.
//!
//! This module provides the [`RetryExecutor`] that wraps every remote call,
//! together with the [`RetryPolicy`] and [`FailureType`] types used to decide
//! whether a failed call is attempted again.
//!
//! # Overview
//!
//! When a call fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - server errors (5xx), timeouts, dropped connections
//! - [`FailureType::RateLimited`] - HTTP 429 (honors Retry-After when present)
//! - [`FailureType::Permanent`] - other 4xx, undecodable bodies, TLS failures
//! - [`FailureType::NeedsAuth`] - HTTP 401, never retried
//!
//! The [`RetryPolicy`] then determines whether to retry based on failure type
//! and attempt count, calculating exponential backoff delays with optional jitter.
//!
//! # Example
//!
//! ```
//! use signature_downloader_core::api::ApiError;
//! use signature_downloader_core::download::{RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = ApiError::http_status("https://api.signaturit.com/v3/signatures.json", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument};

use super::rate_limiter::{RateLimiter, parse_retry_after};
use crate::api::ApiError;

/// Default maximum attempts per remote call (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay for exponential backoff (1.5 seconds).
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1500);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default maximum jitter added to delays (250ms).
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// Classification of remote call failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, malformed JSON.
    Permanent,

    /// The credential was rejected (HTTP 401).
    NeedsAuth,

    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the call after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the call.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `base_delay`: 1.5 seconds
/// - `max_delay`: 32 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 250 ms
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately: 1.5s, 3s, 6s, 12s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f32,

    /// Upper bound of the random jitter added to each delay.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings and default jitter.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (must be >= 1)
    /// * `base_delay` - Base delay for first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a policy with a custom max_attempts, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns a copy of this policy that adds no jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry a failed call.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "credential rejected - retry would not help".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the delay for a retry attempt with exponential backoff and jitter.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt 1 = 2^0 = 1x base
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);

        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    /// Generates random jitter between 0 and `max_jitter`.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies an API error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 401 | NeedsAuth |
/// | HTTP 429 | RateLimited |
/// | HTTP 5xx | Transient |
/// | Other HTTP 4xx | Permanent |
/// | Timeout | Transient |
/// | Network (TLS) | Permanent |
/// | Network (other) | Transient |
/// | Decode / InvalidUrl | Permanent |
#[must_use]
pub fn classify_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::Unauthorized { .. } => FailureType::NeedsAuth,
        ApiError::HttpStatus { status, .. } => classify_http_status(*status),
        ApiError::Timeout { .. } => FailureType::Transient,
        ApiError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        ApiError::Decode { .. } | ApiError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 => FailureType::NeedsAuth,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Bookkeeping for one logical operation driven by [`RetryExecutor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    delays: Vec<Duration>,
}

impl RetryState {
    /// Number of times the operation was invoked.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delays slept between attempts, in order.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total time spent backing off.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Runs remote calls under a [`RetryPolicy`], spacing them with a [`RateLimiter`].
///
/// Backoff uses `tokio::time::sleep`, so only the awaiting operation is
/// suspended.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

impl RetryExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(policy: RetryPolicy, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            policy,
            rate_limiter,
        }
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last error from `op` when it is not retryable or the
    /// attempt budget is exhausted.
    pub async fn execute<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.execute_with_state(operation, op).await.0
    }

    /// Like [`execute`](Self::execute), also returning the attempt bookkeeping.
    #[instrument(skip(self, op), fields(max_attempts = self.policy.max_attempts))]
    pub async fn execute_with_state<T, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> (Result<T, ApiError>, RetryState)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut state = RetryState::default();

        loop {
            state.attempts += 1;
            self.rate_limiter.acquire().await;
            debug!(attempt = state.attempts, "calling API");

            let error = match op().await {
                Ok(value) => return (Ok(value), state),
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            let retry_after_delay = if failure_type == FailureType::RateLimited {
                retry_after_delay(&error)
            } else {
                None
            };

            match self.policy.should_retry(failure_type, state.attempts) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after_delay.unwrap_or(backoff_delay);
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after_delay.is_some(),
                        error = %error,
                        "retrying API call"
                    );
                    state.delays.push(delay);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, attempts = state.attempts, "not retrying API call");
                    return (Err(error), state);
                }
            }
        }
    }
}

fn retry_after_delay(error: &ApiError) -> Option<Duration> {
    let ApiError::HttpStatus {
        retry_after: Some(header),
        ..
    } = error
    else {
        return None;
    };
    parse_retry_after(header)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(5),
            Duration::from_secs(1),
            2.0,
        )
        .without_jitter()
    }

    fn executor(policy: RetryPolicy) -> RetryExecutor {
        RetryExecutor::new(policy, Arc::new(RateLimiter::disabled()))
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(1500));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!((policy.backoff_multiplier - 2.0).abs() < f32::EPSILON);
        assert_eq!(policy.max_jitter, Duration::from_millis(250));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_delay_doubles_each_attempt_without_jitter() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(32), 2.0)
            .without_jitter();
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_calculation_respects_max_delay() {
        let policy =
            RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0).without_jitter();
        assert_eq!(policy.calculate_delay(6), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_millis(1500));
            assert!(delay <= Duration::from_millis(1750));
        }
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_classify_401_needs_auth() {
        assert_eq!(
            classify_error(&ApiError::unauthorized("https://a.test")),
            FailureType::NeedsAuth
        );
        assert_eq!(
            classify_error(&ApiError::http_status("https://a.test", 401)),
            FailureType::NeedsAuth
        );
    }

    #[test]
    fn test_classify_429_rate_limited() {
        let error = ApiError::http_status("https://a.test", 429);
        assert_eq!(classify_error(&error), FailureType::RateLimited);
    }

    #[test]
    fn test_classify_5xx_transient() {
        for status in [500, 502, 503, 504, 599] {
            let error = ApiError::http_status("https://a.test", status);
            assert_eq!(classify_error(&error), FailureType::Transient, "{status}");
        }
    }

    #[test]
    fn test_classify_other_4xx_permanent() {
        for status in [400, 403, 404, 408, 410, 422] {
            let error = ApiError::http_status("https://a.test", status);
            assert_eq!(classify_error(&error), FailureType::Permanent, "{status}");
        }
    }

    #[test]
    fn test_classify_timeout_transient() {
        assert_eq!(
            classify_error(&ApiError::timeout("https://a.test")),
            FailureType::Transient
        );
    }

    #[test]
    fn test_classify_decode_permanent() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            classify_error(&ApiError::decode("https://a.test", source)),
            FailureType::Permanent
        );
    }

    // ==================== Should Retry Decision Tests ====================

    #[test]
    fn test_should_retry_needs_auth_does_not_retry() {
        let decision = RetryPolicy::default().should_retry(FailureType::NeedsAuth, 1);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        let decision = policy.should_retry(FailureType::Transient, 3);
        let RetryDecision::DoNotRetry { reason } = decision else {
            panic!("expected DoNotRetry");
        };
        assert!(reason.contains("exhausted"));
    }

    // ==================== Executor Tests ====================

    #[tokio::test]
    async fn test_execute_rate_limited_twice_then_success() {
        let calls = AtomicU32::new(0);
        let (result, state) = executor(fast_policy(5))
            .execute_with_state("list", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        Err(ApiError::http_status("https://a.test", 429))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.attempts(), 3);
        assert_eq!(
            state.delays(),
            &[Duration::from_millis(5), Duration::from_millis(10)]
        );
        assert!(state.delays()[1] > state.delays()[0]);
    }

    #[tokio::test]
    async fn test_execute_always_500_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let (result, state) = executor(fast_policy(4))
            .execute_with_state("detail", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::http_status("https://a.test", 500)) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ApiError::HttpStatus { status: 500, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(state.attempts(), 4);
        assert_eq!(state.delays().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_unauthorized_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result = executor(fast_policy(5))
            .execute("download", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ApiError::unauthorized("https://a.test")) }
            })
            .await;

        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_uses_retry_after_when_present() {
        let calls = AtomicU32::new(0);
        let (result, state) = executor(fast_policy(3))
            .execute_with_state("list", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::http_status_with_context(
                            "https://a.test",
                            429,
                            Some("0".to_string()),
                            None,
                        ))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(state.delays(), &[Duration::ZERO]);
    }
}
