use std::{future::Future, time::Duration};

use crate::error::{FetchError, FetchResult};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error or the budget runs out.
    ///
    /// Integrity failures are returned as they are once the budget is exhausted, every other
    /// error is wrapped into [FetchError::RetriesExhausted].
    pub async fn run<T, F, Fut>(&self, what: &str, mut attempt: F) -> FetchResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut current = 1;
        loop {
            let error = match attempt(current).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if current >= max_attempts {
                tracing::error!("{what} failed after {current} attempts: {error}");
                return Err(match error {
                    e @ FetchError::Faulty { .. } => e,
                    e => FetchError::RetriesExhausted {
                        attempts: current,
                        last: Box::new(e),
                    },
                });
            }

            tracing::warn!(
                attempt = current,
                "{what} failed: {error}. Retrying in {:?}",
                self.backoff
            );
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
            current += 1;
        }
    }
}
