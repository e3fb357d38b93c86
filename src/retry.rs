//! Retry policy applied uniformly to GET, POST and DELETE.
//!
//! A call is retried when it fails with a transport error of a retryable kind, or when
//! it succeeds with a 503/504 response. After the last attempt the final outcome is
//! returned unchanged: a 503 response stays a response and is classified by the
//! protocol layer.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_MAX_ATTEMPTS;
use crate::error::{Result, TransportErrorKind, TrinoError, DEFAULT_RETRYABLE_KINDS};
use crate::http::HttpResponse;

/// Default base delay for exponential backoff.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default cap on a single backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2 * 3600);

/// Status codes that trigger another attempt.
pub const RETRYABLE_STATUSES: [u16; 2] = [503, 504];

/// Exponential backoff: `min(base * exponent^attempt, max_delay)`, optionally jittered.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub exponent: u32,
    pub max_delay: Duration,
    /// Pick a uniform delay in `[0, delay]` instead of the full delay.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            exponent: 2,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl Backoff {
    /// Backoff that never sleeps.
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            exponent: 1,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.exponent.saturating_pow(attempt);
        let delay = self.base.saturating_mul(factor).min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            rand::thread_rng().gen_range(Duration::ZERO..=delay)
        } else {
            delay
        }
    }
}

/// Retry policy shared by every verb of a transport.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retryable_errors: HashSet<TransportErrorKind>,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Creates a policy retrying connection failures and timeouts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable_errors: DEFAULT_RETRYABLE_KINDS.into_iter().collect(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Adds transport failure kinds to the retryable set.
    pub fn with_retryable_errors(
        mut self,
        kinds: impl IntoIterator<Item = TransportErrorKind>,
    ) -> Self {
        self.retryable_errors.extend(kinds);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts.max(1);
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Whether an error is in the retryable set.
    pub fn is_retryable_error(&self, error: &TrinoError) -> bool {
        match error {
            TrinoError::Transport { kind, .. } => self.retryable_errors.contains(kind),
            _ => false,
        }
    }

    /// Whether a response should be retried.
    pub fn is_retryable_response(response: &HttpResponse) -> bool {
        RETRYABLE_STATUSES.contains(&response.status)
    }

    /// Runs `call`, retrying per this policy.
    ///
    /// With `max_attempts == 1` the call runs exactly once and its outcome is returned
    /// untouched.
    pub async fn run<F, Fut>(&self, mut call: F) -> Result<HttpResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse>>,
    {
        if self.max_attempts == 1 {
            return call().await;
        }

        let mut attempt = 1;
        loop {
            let outcome = call().await;
            let retry = match &outcome {
                Ok(response) => Self::is_retryable_response(response),
                Err(error) => self.is_retryable_error(error),
            };

            if !retry {
                return outcome;
            }
            if attempt >= self.max_attempts {
                info!("failed after {} attempts", attempt);
                return outcome;
            }

            let delay = self.backoff.delay(attempt);
            match &outcome {
                Ok(response) => warn!(
                    "HTTP {} (attempt {} of {}), retrying in {:?}",
                    response.status, attempt, self.max_attempts, delay
                ),
                Err(error) => warn!(
                    "{} (attempt {} of {}), retrying in {:?}",
                    error, attempt, self.max_attempts, delay
                ),
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
            debug!("retry attempt {} of {}", attempt, self.max_attempts);
        }
    }
}
