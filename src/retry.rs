//! Fixed-delay retry policy and the combinator that applies it.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy without any pause between attempts (for tests and dry runs).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Single attempt, no retries.
    pub fn once() -> Self {
        Self::immediate(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

/// Run `op` until it succeeds or the policy runs out of attempts.
///
/// The last error is wrapped in [`BenchError::RetriesExhausted`].
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(BenchError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }
            Err(err) => {
                debug!(operation, attempt, max_attempts, error = %err, "attempt failed, retrying");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Cell::new(0);
        let result = retry(&RetryPolicy::immediate(3), "op", || {
            calls.set(calls.get() + 1);
            async { Ok::<_, BenchError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry(&RetryPolicy::immediate(5), "op", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(BenchError::Http("flaky".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_exact_attempt_count() {
        let calls = Cell::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(4), "upsert", || {
            calls.set(calls.get() + 1);
            async { Err(BenchError::Http("down".to_string())) }
        })
        .await;

        assert_eq!(calls.get(), 4);
        match result {
            Err(BenchError::RetriesExhausted {
                operation,
                attempts,
                ..
            }) => {
                assert_eq!(operation, "upsert");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }

    #[test]
    fn test_policy_yaml_uses_seconds() {
        let policy: RetryPolicy = serde_yaml::from_str("max_attempts: 8\ndelay: 3\n").unwrap();
        assert_eq!(policy, RetryPolicy::new(8, Duration::from_secs(3)));
    }
}
