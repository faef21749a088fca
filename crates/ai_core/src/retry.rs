//! Transport retry with exponential backoff
//!
//! Every outbound call to the inference server goes through [`retry`].
//! Connection failures, timeouts and a fixed set of HTTP statuses are
//! retried; anything else is returned immediately.

use std::{fmt::Display, future::Future, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::InferenceError;

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Randomise delays by up to `jitter_factor`
    #[serde(default = "default_true")]
    pub jitter_enabled: bool,

    /// Maximum jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// HTTP statuses treated as transient
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

const fn default_initial_delay() -> u64 {
    250
}

const fn default_max_delay() -> u64 {
    4_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

const fn default_jitter_factor() -> f64 {
    0.1
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
            jitter_enabled: default_true(),
            jitter_factor: default_jitter_factor(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

impl RetryConfig {
    /// Policy that never retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Disable jitter
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    /// Whether an HTTP status is in the transient set
    pub fn retries_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before retry number `attempt` (0-indexed)
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = (self.initial_delay_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter_enabled && self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Errors that know whether a policy considers them transient
pub trait Retryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self, policy: &RetryConfig) -> bool;
}

impl Retryable for InferenceError {
    fn is_retryable(&self, policy: &RetryConfig) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout(_) => true,
            Self::ServerError { status, .. } => policy.retries_status(*status),
            _ => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or the policy is spent
#[allow(clippy::cast_possible_truncation)]
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        attempts,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(value);
            },
            Err(err) => {
                let retry_attempt = attempts - 1;

                if !err.is_retryable(config) {
                    debug!(attempts, error = %err, "Operation failed with non-retryable error");
                    return Err(err);
                }

                if retry_attempt >= config.max_retries {
                    warn!(
                        attempts,
                        max_retries = config.max_retries,
                        error = %err,
                        "Operation failed after max retries"
                    );
                    return Err(err);
                }

                let delay = config.delay_for_attempt(retry_attempt);
                warn!(
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    fn server_error(status: u16) -> InferenceError {
        InferenceError::ServerError {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn default_values() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_statuses, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn delay_doubles_until_capped() {
        let config = RetryConfig::default().without_jitter();
        assert_eq!(config.delay_for_attempt(0).as_millis(), 250);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 500);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 1000);
        assert_eq!(config.delay_for_attempt(10).as_millis(), 4000);
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter_factor: 0.1,
            ..RetryConfig::default()
        };
        for _ in 0..20 {
            let delay_ms = config.delay_for_attempt(0).as_millis();
            assert!((900..=1100).contains(&delay_ms), "delay_ms={delay_ms}");
        }
    }

    #[test]
    fn classification_follows_policy() {
        let policy = RetryConfig::default();
        assert!(server_error(503).is_retryable(&policy));
        assert!(server_error(429).is_retryable(&policy));
        assert!(!server_error(404).is_retryable(&policy));
        assert!(InferenceError::ConnectionFailed("refused".into()).is_retryable(&policy));
        assert!(InferenceError::Timeout(1).is_retryable(&policy));
        assert!(!InferenceError::InvalidResponse("x".into()).is_retryable(&policy));

        let narrow = RetryConfig {
            retry_statuses: vec![502],
            ..RetryConfig::default()
        };
        assert!(!server_error(503).is_retryable(&narrow));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_then_succeeds() {
        let config = RetryConfig::default().without_jitter();
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error(503))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let config = RetryConfig::default().without_jitter();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error(500))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry(&config, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error(404))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_policy_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = retry(&RetryConfig::disabled(), || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(InferenceError::ConnectionFailed("refused".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
