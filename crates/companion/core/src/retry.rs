//! Retry strategy for calls made per ingested height.

use backon::{ExponentialBuilder, Retryable};
use std::{fmt::Display, future::Future, time::Duration};
use tracing::warn;

/// How a failed per-height operation is handled before it is given up.
///
/// The default drops the height after the first failure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Give up after the first failure.
    #[default]
    Drop,
    /// Retry with exponential backoff.
    Exponential {
        /// Maximum number of retries after the first attempt.
        max_retries: usize,
        /// Delay before the first retry.
        min_delay: Duration,
        /// Upper bound of the delay between retries.
        max_delay: Duration,
    },
}

impl RetryPolicy {
    /// Runs `op` under this policy.
    ///
    /// Errors for which `retryable` returns `false` are returned immediately.
    pub async fn run<T, E, F, Fut>(
        &self,
        name: &'static str,
        mut op: F,
        retryable: impl FnMut(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match *self {
            Self::Drop => op().await,
            Self::Exponential { max_retries, min_delay, max_delay } => {
                let backoff = ExponentialBuilder::default()
                    .with_min_delay(min_delay)
                    .with_max_delay(max_delay)
                    .with_max_times(max_retries);
                op.retry(backoff)
                    .sleep(tokio::time::sleep)
                    .when(retryable)
                    .notify(|err: &E, delay: Duration| {
                        warn!(
                            target: "companion::retry",
                            operation = name,
                            %err,
                            ?delay,
                            "Operation failed, retrying"
                        );
                    })
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn exponential(max_retries: usize) -> RetryPolicy {
        RetryPolicy::Exponential {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_drop_policy_runs_once() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), String> = RetryPolicy::Drop
            .run(
                "test",
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exponential_policy_retries_until_success() {
        let attempts = AtomicUsize::new(0);
        let result: Result<usize, String> = exponential(5)
            .run(
                "test",
                || async {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 { Err("boom".to_string()) } else { Ok(attempt) }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_exponential_policy_respects_predicate() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), String> = exponential(5)
            .run(
                "test",
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("fatal".to_string())
                },
                |err: &String| err != "fatal",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exponential_policy_gives_up() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), String> = exponential(2)
            .run(
                "test",
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                },
                |_| true,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
