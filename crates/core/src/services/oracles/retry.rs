use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::oracle::{Embedding, EmbeddingOracle, OracleResult};

/// Bounded exponential backoff for transient oracle failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_ms: 200, max_backoff_ms: 5_000 }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Wraps an oracle and retries its transient failures per `RetryPolicy`.
/// Permanent failures and exhausted retries surface unchanged.
pub struct RetryingOracle<'a> {
    inner: &'a dyn EmbeddingOracle,
    policy: RetryPolicy,
}

impl<'a> RetryingOracle<'a> {
    pub fn new(inner: &'a dyn EmbeddingOracle, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn run<T>(&self, op: &str, call: impl Fn() -> OracleResult<T>) -> OracleResult<T> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        oracle = self.inner.name(),
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying oracle call"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl EmbeddingOracle for RetryingOracle<'_> {
    fn embed(&self, batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>> {
        self.run("embed", || self.inner.embed(batch))
    }

    fn compare(&self, a: &[Embedding], b: &[Embedding]) -> OracleResult<Vec<f32>> {
        self.run("compare", || self.inner.compare(a, b))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_attempts: 5, initial_backoff_ms: 100, max_backoff_ms: 350 };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(80), Duration::from_millis(350));
    }
}
