//! Retry with linear backoff

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Attempt limit plus linear backoff: the wait after failed attempt `n`
/// is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Delays between attempts, one fewer than `max_attempts`
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        (1..policy.max_attempts).map(move |attempt| policy.delay_after(attempt))
    }
}

/// Run `action` until it succeeds, fails with an error `retryable` rejects,
/// or the policy runs out of attempts. The action receives the 1-based
/// attempt number. The last error is returned on failure.
pub async fn retry_if<T, E, A, Fut, P>(policy: &RetryPolicy, mut action: A, retryable: P) -> Result<T, E>
where
    A: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let attempt = AtomicU32::new(0);
    RetryIf::spawn(
        policy.delays(),
        || {
            let n = attempt.fetch_add(1, Ordering::SeqCst) + 1;
            action(n)
        },
        retryable,
    )
    .await
}
