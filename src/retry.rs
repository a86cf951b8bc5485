//! Retry with exponential backoff and jitter
//!
//! Used for startup calls that race the API server coming up (CRD install).
//! Reconciles never retry internally; the controller's error policy requeues
//! them instead.
//!
//! # Example
//!
//! ```ignore
//! use hoper::retry::{retry_while, RetryConfig};
//!
//! retry_while(
//!     &RetryConfig::startup(),
//!     "install_tenant_crd",
//!     || async { crds.patch(&name, &params, &Patch::Apply(&crd)).await },
//!     |e| !matches!(e, kube::Error::Api(ae) if ae.code == 403),
//! )
//! .await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Backoff settings for an operation that may fail transiently
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 = infinite)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor applied to the delay after every failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Bounded retry for operator startup
    ///
    /// Roughly a minute of attempts before giving up, so a misconfigured
    /// operator exits instead of hanging.
    pub fn startup() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: 2.0,
        }
    }

    /// Delay before the next attempt, without jitter
    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Execute an async operation with exponential backoff and jitter
///
/// Retries until success, until `max_attempts` is reached, or until
/// `retryable` rejects an error. The last error is returned.
pub async fn retry_while<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        let e = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !retryable(&e) {
            error!(
                operation = %operation_name,
                attempt = attempt,
                error = %e,
                "Operation failed with non-retryable error"
            );
            return Err(e);
        }

        if config.exhausted(attempt) {
            error!(
                operation = %operation_name,
                attempt = attempt,
                error = %e,
                "Operation failed after max retries"
            );
            return Err(e);
        }

        // 0.5x to 1.5x of the delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

        warn!(
            operation = %operation_name,
            attempt = attempt,
            error = %e,
            delay_ms = jittered_delay.as_millis(),
            "Operation failed, retrying"
        );

        tokio::time::sleep(jittered_delay).await;
        delay = config.next_delay(delay);
    }
}
