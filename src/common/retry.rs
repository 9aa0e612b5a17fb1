use crate::error::{Error, Result};

use std::time::Duration;

/// Bounded exponential backoff for unprocessed batch work and throttled pages.
///
/// The delay before retry `n` (0-based) is `initial_delay * 2^n`, capped at
/// `max_delay`. A request is issued at most `max_attempts` times.
///
/// ```rust
/// use dynamodb_mapper::common::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.delay(0), Duration::from_millis(100));
/// assert_eq!(policy.delay(1), Duration::from_millis(200));
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of times a request is issued, the first attempt included.
    ///
    /// Defaults to 5.
    pub max_attempts: u32,
    /// Delay before the first retry. Defaults to 100ms.
    pub initial_delay: Duration,
    /// Upper bound of any single delay. Defaults to 2s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, mostly useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts` requests were issued.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.max(1)
    }

    pub(crate) async fn backoff(&self, attempt: u32) {
        let delay = self.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `operation`, retrying transient failures under this policy.
    pub(crate) async fn retry_transient<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match operation().await {
                Err(Error::Transient(error)) if self.allows(attempts) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempts, %error, "retrying transient store error");
                    #[cfg(not(feature = "tracing"))]
                    let _ = error;
                    self.backoff(attempts - 1).await;
                }
                result => return result,
            }
        }
    }
}
