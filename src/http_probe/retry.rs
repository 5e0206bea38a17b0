//! Bounded retry with a fixed pause between attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::prelude::*;

/// Pauses between attempts. Injected so tests can run without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Fixed pause before every retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds, fails with an error `retryable`
    /// rejects, or the attempts are used up. The last error is returned.
    ///
    /// `label` only feeds the progress log line.
    pub async fn run<T, F, Fut, P>(
        &self,
        label: &str,
        sleeper: &dyn Sleeper,
        cancel: &CancellationToken,
        retryable: P,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ProbeError) -> bool,
    {
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !retryable(&err) || attempt >= self.max_attempts {
                return Err(err);
            }

            info!(
                attempt,
                max_attempts = self.max_attempts,
                "Retrying {}/{} for URL: {}",
                attempt,
                self.max_attempts,
                label
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                _ = sleeper.sleep(self.delay) => {}
            }
            attempt += 1;
        }
    }
}
