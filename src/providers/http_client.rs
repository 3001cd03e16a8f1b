//! Rate-Limited HTTP Client for the assistant API
//!
//! Wraps `reqwest::Client` with a governor quota so bursts of chat requests
//! never exceed the upstream per-minute limit, and retries transient
//! failures with exponential backoff.

use governor::{Quota, RateLimiter, state::NotKeyed, clock::DefaultClock, middleware::NoOpMiddleware};
use nonzero_ext::nonzero;
use reqwest::{Client, RequestBuilder, Response};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::providers::traits::{ProviderError, ProviderResult};

/// Longest we will honour an upstream Retry-After before giving up on the attempt
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Rate-limited HTTP client for API requests
pub struct RateLimitedClient {
    /// Inner HTTP client
    client: Client,

    /// Rate limiter (requests per minute)
    limiter: RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock, NoOpMiddleware>,

    /// Remaining requests (from API response headers)
    remaining_requests: AtomicU32,
}

impl RateLimitedClient {
    /// Create a new rate-limited client
    ///
    /// # Arguments
    /// * `rate_limit_per_minute` - Maximum requests allowed per minute (at least 1)
    /// * `timeout` - Whole-request timeout
    pub fn new(rate_limit_per_minute: u32, timeout: Duration) -> ProviderResult<Self> {
        let rate = NonZeroU32::new(rate_limit_per_minute).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_minute(rate));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("tryon-compositor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(RateLimitedClient {
            client,
            limiter,
            remaining_requests: AtomicU32::new(rate.get()),
        })
    }

    /// Get remaining requests in current rate limit window
    pub fn remaining_requests(&self) -> Option<u32> {
        let remaining = self.remaining_requests.load(Ordering::Relaxed);
        if remaining > 0 {
            Some(remaining)
        } else {
            None
        }
    }

    /// Build a POST request
    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder<'_> {
        RateLimitedRequestBuilder {
            client: self,
            builder: self.client.post(url),
        }
    }

    /// Wait for rate limit and execute request
    async fn execute(&self, builder: RequestBuilder) -> ProviderResult<Response> {
        self.limiter.until_ready().await;

        debug!("Executing rate-limited request");

        let response = builder.send().await?;

        if let Some(remaining) = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
        {
            self.remaining_requests.store(remaining, Ordering::Relaxed);
        }

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_RETRY_AFTER_SECS);

            warn!(retry_after_secs = retry_after, "Rate limited by provider");

            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if response.status().is_server_error() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError { status, message });
        }

        Ok(response)
    }

    /// Execute request with retries and exponential backoff
    ///
    /// Only rate limiting, transport failures and 5xx answers are retried.
    pub async fn execute_with_retry(
        &self,
        builder: RequestBuilder,
        max_retries: u32,
    ) -> ProviderResult<Response> {
        let mut last_error = None;
        let mut backoff = Duration::from_millis(500);

        for attempt in 0..=max_retries {
            if attempt > 0 {
                debug!(attempt, backoff_ms = backoff.as_millis(), "Retrying request");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(30));
            }

            let request = builder.try_clone().ok_or_else(|| {
                ProviderError::Internal("Request body cannot be retried".to_string())
            })?;

            match self.execute(request).await {
                Ok(response) => return Ok(response),
                Err(ProviderError::RateLimited { retry_after_secs }) => {
                    if attempt < max_retries {
                        let wait = retry_after_secs.min(MAX_RETRY_AFTER_SECS);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    last_error = Some(ProviderError::RateLimited { retry_after_secs });
                }
                Err(e) if is_retryable(&e) => {
                    warn!(attempt, error = %e, "Provider request failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Internal("Unknown error".to_string())))
    }
}

fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        ProviderError::ApiError { status, .. } => *status >= 500,
        ProviderError::RateLimited { .. } => true,
        _ => false,
    }
}

/// Request builder wrapper that enforces rate limiting
pub struct RateLimitedRequestBuilder<'a> {
    client: &'a RateLimitedClient,
    builder: RequestBuilder,
}

impl<'a> RateLimitedRequestBuilder<'a> {
    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Add JSON body to the request
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    /// Send with retries
    pub async fn send_with_retry(self, max_retries: u32) -> ProviderResult<Response> {
        self.client.execute_with_retry(self.builder, max_retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_client_creation() {
        let client = RateLimitedClient::new(120, Duration::from_secs(5)).unwrap();
        assert_eq!(client.remaining_requests(), Some(120));
    }

    #[test]
    fn test_zero_rate_is_raised_to_one() {
        let client = RateLimitedClient::new(0, Duration::from_secs(5)).unwrap();
        assert_eq!(client.remaining_requests(), Some(1));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&ProviderError::RateLimited { retry_after_secs: 1 }));
        assert!(is_retryable(&ProviderError::ApiError { status: 503, message: String::new() }));
        assert!(!is_retryable(&ProviderError::ApiError { status: 400, message: String::new() }));
        assert!(!is_retryable(&ProviderError::ParseError("bad".to_string())));
    }
}
