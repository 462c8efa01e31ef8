//! Retry policy implementation.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use tracing::instrument;

use crate::context::RequestContext;
use crate::errors::SccError;

/// Default number of retries once retries are enabled.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default ceiling for a single backoff interval.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Default first backoff interval.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(1);

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt. Zero disables retries.
    pub max_retries: u32,
    /// Interval before the first retry.
    pub initial_interval: Duration,
    /// Upper bound for any single interval, including `Retry-After`.
    pub max_interval: Duration,
    /// Whether to add up to 10% random jitter.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with retries enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial interval.
    pub fn initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the maximum interval.
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets whether to use jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Creates a configuration with no retries.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Returns true if at least one retry is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }
}

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the policy configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes an operation, retrying transient failures.
    ///
    /// `operation` receives the zero-based attempt number. The context is
    /// checked before every attempt and raced against every sleep.
    #[instrument(skip(self, ctx, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T>(
        &self,
        ctx: &RequestContext,
        mut operation: F,
    ) -> Result<T, SccError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SccError>>,
    {
        let mut attempt = 0;

        loop {
            ctx.check("starting attempt")?;

            let err = match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = self.calculate_delay(attempt, &err);

            tracing::info!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );

            ctx.sleep(delay).await?;
        }
    }

    /// Calculates the delay before retry number `retry` (1-based).
    pub(crate) fn calculate_delay(&self, retry: u32, error: &SccError) -> Duration {
        let max = self.config.max_interval;

        if let Some(retry_after) = error.retry_after() {
            return retry_after.min(max);
        }

        let exponent = retry.saturating_sub(1).min(31);
        let base = self
            .config
            .initial_interval
            .saturating_mul(1u32 << exponent)
            .min(max);

        if self.config.jitter {
            let jitter = base.mul_f64(rand::random::<f64>() * 0.1);
            (base + jitter).min(max)
        } else {
            base
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::no_retries())
    }
}

/// Parses a `Retry-After` header given as delta-seconds or an HTTP-date.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DetailedResponse;
    use bytes::Bytes;
    use http::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn server_error(status: u16, retry_after: Option<&'static str>) -> SccError {
        let mut headers = HeaderMap::new();
        if let Some(value) = retry_after {
            headers.insert(http::header::RETRY_AFTER, HeaderValue::from_static(value));
        }
        SccError::from_response(DetailedResponse {
            status_code: status,
            headers,
            result: None,
            raw_body: Bytes::new(),
        })
    }

    fn fast_config(retries: u32) -> RetryConfig {
        RetryConfig::new()
            .max_retries(retries)
            .initial_interval(Duration::from_millis(5))
            .max_interval(Duration::from_millis(20))
            .jitter(false)
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let policy = RetryPolicy::new(fast_config(3));

        let result = policy
            .execute(&RequestContext::background(), |_| async {
                Ok::<_, SccError>("success")
            })
            .await;

        assert_eq!(result.unwrap(), "success");
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let policy = RetryPolicy::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(&RequestContext::background(), |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error(500, None))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let policy = RetryPolicy::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(&RequestContext::background(), |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error(404, None))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().status_code(), Some(404));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let policy = RetryPolicy::new(fast_config(2));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(&RequestContext::background(), |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error(503, None))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_no_retries_single_attempt() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let _ = policy
            .execute(&RequestContext::background(), |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error(500, None))
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_during_sleep() {
        let config = RetryConfig::new()
            .max_retries(5)
            .initial_interval(Duration::from_secs(2))
            .max_interval(Duration::from_secs(2))
            .jitter(false);
        let policy = RetryPolicy::new(config);
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let attempts = Arc::new(AtomicU32::new(0));

        let err = policy
            .execute(&ctx, |_| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error(500, None))
                }
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("deadline exceeded"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(
            RetryConfig::new()
                .initial_interval(Duration::from_millis(100))
                .max_interval(Duration::from_secs(1))
                .jitter(false),
        );
        let error = server_error(500, None);

        assert_eq!(policy.calculate_delay(1, &error).as_millis(), 100);
        assert_eq!(policy.calculate_delay(2, &error).as_millis(), 200);
        assert_eq!(policy.calculate_delay(3, &error).as_millis(), 400);
        assert_eq!(policy.calculate_delay(10, &error).as_millis(), 1000);
    }

    #[test]
    fn test_jitter_stays_within_max() {
        let policy = RetryPolicy::new(
            RetryConfig::new()
                .initial_interval(Duration::from_millis(100))
                .max_interval(Duration::from_millis(150)),
        );
        let error = server_error(500, None);

        for retry in 1..6 {
            let delay = policy.calculate_delay(retry, &error);
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_retry_after_supersedes_and_is_clamped() {
        let policy = RetryPolicy::new(
            RetryConfig::new()
                .initial_interval(Duration::from_millis(100))
                .max_interval(Duration::from_secs(5))
                .jitter(false),
        );

        assert_eq!(
            policy.calculate_delay(1, &server_error(429, Some("2"))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.calculate_delay(1, &server_error(429, Some("120"))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_retry_after_http_date_in_past() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_garbage_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_from_headers(&headers), None);
    }
}
