// src/retry/strategy.rs

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How many extra attempts follow a failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Single attempt.
    Never,
    /// `n` attempts after the first failure.
    Limited(u32),
    /// Keep trying until an attempt succeeds.
    Forever,
}

impl RetryPolicy {
    /// Maps the configuration knob: unset = no retry, `0` = forever, `n` = n retries.
    pub fn from_setting(retry: Option<u32>) -> Self {
        match retry {
            None => RetryPolicy::Never,
            Some(0) => RetryPolicy::Forever,
            Some(n) => RetryPolicy::Limited(n),
        }
    }

    /// Total attempts allowed, `None` when unbounded.
    pub fn max_attempts(&self) -> Option<u64> {
        match self {
            RetryPolicy::Never => Some(1),
            RetryPolicy::Limited(n) => Some(u64::from(*n) + 1),
            RetryPolicy::Forever => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryStrategy {
    policy: RetryPolicy,
    interval: Duration,
}

#[derive(Debug)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryStrategy {
    pub fn new(policy: RetryPolicy, interval: Duration) -> Self {
        Self { policy, interval }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Execute a function, retrying every failure
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_with_decision(f, |_| RetryDecision::Retry).await
    }

    /// Execute with custom retry decision logic.
    ///
    /// The last error is returned unchanged once attempts run out. The fixed
    /// interval separates attempts; nothing sleeps after the final one.
    pub async fn execute_with_decision<F, Fut, T, E>(
        &self,
        mut f: F,
        should_retry: impl Fn(&E) -> RetryDecision,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(error) => match should_retry(&error) {
                    RetryDecision::NoRetry => {
                        debug!("Error is non-retryable: {}", error);
                        return Err(error);
                    }
                    RetryDecision::Retry => {
                        if max_attempts.is_some_and(|max| attempt >= max) {
                            warn!("Giving up after {} attempts: {}", attempt, error);
                            return Err(error);
                        }

                        warn!(
                            "Attempt {} failed: {}. Retrying in {:?}",
                            attempt, error, self.interval
                        );
                        sleep(self.interval).await;
                    }
                },
            }
        }
    }
}
