//! Bounded retry with exponential backoff for transient provider failures.
//!
//! Calls go through a `seatbelt` retry layer. Whether a failure is worth
//! another attempt is decided by [`ProviderError::is_transient`].

use std::future::Future;
use std::time::Duration;

use layered::{Execute, Service, Stack};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;
use tracing::warn;

use super::error::ProviderError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry. Later delays double.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given retry count and the default delay.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Set the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Run `op` on `input` until it succeeds, fails permanently, or retries
    /// run out.
    ///
    /// The input is cloned for every attempt. The last error is returned
    /// unchanged, so callers can still ask it whether it was transient.
    pub async fn run<In, T, F, Fut>(
        &self,
        call: &'static str,
        input: In,
        op: F,
    ) -> Result<T, ProviderError>
    where
        In: Clone + Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(In) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
    {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name(call);

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &Result<T, ProviderError>, _| recovery(result))
                .max_retry_attempts(self.max_retries)
                .base_delay(self.base_delay)
                .backoff(Backoff::Exponential)
                .on_retry(move |output, args| {
                    if let Err(e) = output {
                        warn!(
                            call,
                            attempt = args.attempt().index() + 1,
                            delay_ms = args.retry_delay().as_millis() as u64,
                            error = %e,
                            "Transient provider failure, retrying"
                        );
                    }
                }),
            Execute::new(move |input: In| {
                let op = op.clone();
                async move { op(input).await }
            }),
        )
            .into_service();

        service.execute(input).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

fn recovery<T>(result: &Result<T, ProviderError>) -> RecoveryInfo {
    match result {
        Err(e) if e.is_transient() => RecoveryInfo::retry(),
        _ => RecoveryInfo::never(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ProviderError {
        ProviderError::Api {
            status: 503,
            message: "busy".into(),
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn base_delay_is_configurable() {
        let policy = RetryPolicy::new(7).with_base_delay(Duration::from_millis(20));
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.base_delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = fast(3)
            .run("test", Arc::clone(&calls), |calls: Arc<AtomicU32>| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(transient()) } else { Ok(n) }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = fast(2)
            .run("test", Arc::clone(&calls), |calls: Arc<AtomicU32>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = fast(5)
            .run("test", Arc::clone(&calls), |calls: Arc<AtomicU32>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Unauthorized { provider: "bart" })
            })
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::Unauthorized { provider: "bart" })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = fast(0)
            .run("test", Arc::clone(&calls), |calls: Arc<AtomicU32>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
