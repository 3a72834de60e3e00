use std::time::Duration;
use tracing::{debug, error, warn};

use super::embedder::EmbeddingError;
use crate::config::EmbeddingConfig;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Bounded exponential backoff for embedding HTTP requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    initial_backoff: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
        }
    }

    #[inline]
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay to wait after the given (1-based) failed attempt
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run a request, retrying transport failures and server errors.
    ///
    /// Client errors (4xx) fail immediately.
    #[inline]
    pub fn run<F>(&self, target: &str, mut request_fn: F) -> Result<String, EmbeddingError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(EmbeddingError::Request(format!(
                                    "Client error: HTTP {}",
                                    status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(EmbeddingError::Request(format!(
                            "Non-retryable error: {}",
                            error
                        )));
                    }

                    last_error = Some(EmbeddingError::Request(format!(
                        "Request error: {}",
                        error
                    )));

                    if attempt < self.attempts {
                        let delay = self.delay_after(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", target);

        Err(last_error.unwrap_or_else(|| {
            EmbeddingError::Request("Request failed after retries".to_string())
        }))
    }
}

/// Blocking HTTP agent shared by the embedding back-ends
pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
