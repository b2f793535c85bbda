// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use breakwater_clock::Clock;

use super::backoff::Delays;
use super::{Attempt, RetryConfig};
use crate::rnd::Rnd;
use crate::telemetry::TelemetryHelper;
use crate::{ConfigError, ResilienceContext};

pub(crate) const RETRY_STRATEGY_NAME: &str = "retry";
pub(crate) const RETRY_EVENT_NAME: &str = "retry";

/// Re-runs a failing operation a bounded number of times, waiting between attempts.
///
/// Every error is retried unless a predicate is installed with
/// [`retry_if`][RetryPolicy::retry_if]. Waits go through the [`Clock`] of the
/// [`ResilienceContext`], so tests can drive them with a controlled clock.
///
/// A policy is cheap to clone and can be shared between threads.
///
/// # Examples
///
/// ```
/// use breakwater::ResilienceContext;
/// use breakwater::retry::{RetryConfig, RetryPolicy};
/// use breakwater_clock::Clock;
///
/// let context = ResilienceContext::new(Clock::new_system());
/// let policy = RetryPolicy::new(RetryConfig::default().with_base_delay(std::time::Duration::ZERO), &context)?
///     .retry_if(|error: &std::io::Error| error.kind() == std::io::ErrorKind::TimedOut);
///
/// let result = policy.execute(|attempt| {
///     if attempt.index() < 2 {
///         Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
///     } else {
///         Ok(attempt.index())
///     }
/// });
///
/// assert_eq!(result?, 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RetryPolicy<E> {
    config: RetryConfig,
    should_retry: Option<ShouldRetry<E>>,
    clock: Clock,
    telemetry: TelemetryHelper,
    rnd: Rnd,
}

/// The attempt to run next and how long to wait before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NextAttempt {
    pub attempt: Attempt,
    pub delay: Duration,
}

impl<E> RetryPolicy<E> {
    /// Creates a policy that retries every error.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn new(config: RetryConfig, context: &ResilienceContext) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            should_retry: None,
            clock: context.clock().clone(),
            telemetry: context.create_telemetry(RETRY_STRATEGY_NAME.into()),
            rnd: Rnd::default(),
        })
    }

    /// Retries only the errors for which `predicate` returns `true`.
    #[must_use]
    pub fn retry_if(self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            should_retry: Some(ShouldRetry(Arc::new(predicate))),
            ..self
        }
    }

    /// The configuration the policy was created with.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `error` may be retried, ignoring the attempt budget.
    #[must_use]
    pub fn is_retryable(&self, error: &E) -> bool {
        self.should_retry.as_ref().is_none_or(|predicate| (predicate.0)(error))
    }

    /// Runs `operation` until it succeeds, the error is not retryable, or the attempts run out.
    ///
    /// Waits between attempts block the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub fn execute<T>(&self, mut operation: impl FnMut(Attempt) -> Result<T, E>) -> Result<T, E> {
        let mut delays = self.delays();
        let mut attempt = self.first_attempt();

        loop {
            let error = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.next_attempt(attempt, &error, &mut delays) {
                ControlFlow::Continue(next) => {
                    self.emit_retry(next);
                    self.clock.sleep(next.delay);
                    attempt = next.attempt;
                }
                ControlFlow::Break(()) => return Err(error),
            }
        }
    }

    /// Runs the future returned by `operation` until it succeeds, the error is not retryable,
    /// or the attempts run out.
    ///
    /// Waits between attempts are timer delays of the clock and never block a thread.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn execute_async<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delays = self.delays();
        let mut attempt = self.first_attempt();

        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.next_attempt(attempt, &error, &mut delays) {
                ControlFlow::Continue(next) => {
                    self.emit_retry(next);
                    self.clock.delay(next.delay).await;
                    attempt = next.attempt;
                }
                ControlFlow::Break(()) => return Err(error),
            }
        }
    }

    pub(crate) fn first_attempt(&self) -> Attempt {
        Attempt::first(self.config.max_attempts)
    }

    pub(crate) fn delays(&self) -> Delays {
        Delays::new(
            self.config.backoff,
            self.config.base_delay,
            self.config.max_delay,
            self.config.use_jitter,
            self.rnd.clone(),
        )
    }

    /// Decides whether the failed `attempt` is followed by another one. Emits nothing; the
    /// caller reports the retry with [`emit_retry`][Self::emit_retry] once it commits to it.
    pub(crate) fn next_attempt(&self, attempt: Attempt, error: &E, delays: &mut Delays) -> ControlFlow<(), NextAttempt> {
        if !self.is_retryable(error) {
            return ControlFlow::Break(());
        }

        let Some(next) = attempt.increment(self.config.max_attempts) else {
            return ControlFlow::Break(());
        };

        let delay = delays.next().unwrap_or_default();

        ControlFlow::Continue(NextAttempt { attempt: next, delay })
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn telemetry(&self) -> &TelemetryHelper {
        &self.telemetry
    }

    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "only read when telemetry is compiled in")
    )]
    pub(crate) fn emit_retry(&self, next: NextAttempt) {
        let NextAttempt { attempt, delay } = next;

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "breakwater.retry",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt.index(),
                resilience.attempt.is_last = attempt.is_last(),
                resilience.retry.delay = delay.as_secs_f32(),
            );
        }

        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            use crate::telemetry::{ATTEMPT_INDEX, ATTEMPT_IS_LAST};

            self.telemetry.report_event(
                RETRY_EVENT_NAME,
                &[
                    opentelemetry::KeyValue::new(ATTEMPT_INDEX, i64::from(attempt.index())),
                    opentelemetry::KeyValue::new(ATTEMPT_IS_LAST, attempt.is_last()),
                ],
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn with_rnd(self, rnd: Rnd) -> Self {
        Self { rnd, ..self }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            should_retry: self.should_retry.clone(),
            clock: self.clock.clone(),
            telemetry: self.telemetry.clone(),
            rnd: self.rnd.clone(),
        }
    }
}

impl<E> Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("should_retry", &self.should_retry)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

struct ShouldRetry<E>(Arc<dyn Fn(&E) -> bool + Send + Sync>);

impl<E> Clone for ShouldRetry<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> Debug for ShouldRetry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShouldRetry").finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use breakwater_clock::ClockControl;
    use opentelemetry::KeyValue;

    use super::*;
    use crate::retry::Backoff;
    use crate::telemetry::{ATTEMPT_INDEX, ATTEMPT_IS_LAST, EVENT_NAME, STRATEGY_NAME};
    use crate::testing::{LogCapture, MetricTester, TestError};

    fn policy(config: RetryConfig) -> (RetryPolicy<TestError>, ClockControl) {
        let control = ClockControl::new();
        let context = ResilienceContext::new(control.to_clock());

        (RetryPolicy::new(config, &context).unwrap(), control)
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(RetryPolicy<TestError>: Send, Sync, Clone, Debug);
        static_assertions::assert_impl_all!(RetryPolicy<std::rc::Rc<String>>: Send, Sync, Clone);
    }

    #[test]
    fn new_rejects_zero_attempts() {
        let context = ResilienceContext::new(Clock::new_frozen());

        let error = RetryPolicy::<TestError>::new(RetryConfig::default().with_max_attempts(0), &context).unwrap_err();

        assert_eq!(error, ConfigError::ZeroMaxAttempts);
    }

    #[test]
    fn success_on_first_attempt_does_not_wait() {
        let (policy, control) = policy(RetryConfig::default());
        let start = control.to_clock().instant();

        let result = policy.execute(|attempt| Ok::<_, TestError>(attempt.index()));

        assert_eq!(result, Ok(0));
        assert_eq!(control.to_clock().instant(), start);
    }

    #[test]
    fn retries_until_success_with_waits() {
        let (policy, control) = policy(
            RetryConfig::default()
                .with_backoff(Backoff::Linear)
                .with_base_delay(Duration::from_millis(100)),
        );
        let clock = control.to_clock();
        let start = clock.instant();

        let result = policy.execute(|attempt| {
            if attempt.is_last() {
                Ok(attempt.index())
            } else {
                Err(TestError::new("transient"))
            }
        });

        assert_eq!(result, Ok(2));
        assert_eq!(clock.instant() - start, Duration::from_millis(300));
    }

    #[test]
    fn exhausted_returns_last_error() {
        let (policy, _) = policy(RetryConfig::default().with_max_attempts(2));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy.execute(|attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(TestError::new(format!("attempt {attempt}")))
        });

        assert_eq!(result, Err(TestError::new("attempt 1")));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn non_retryable_error_stops_immediately() {
        let (policy, _) = policy(RetryConfig::default().with_max_attempts(5));
        let policy = policy.retry_if(|error: &TestError| error.to_string() == "transient");
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy.execute(|_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(TestError::new("fatal"))
        });

        assert_eq!(result, Err(TestError::new("fatal")));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(policy.is_retryable(&TestError::new("transient")));
        assert!(!policy.is_retryable(&TestError::new("fatal")));
    }

    #[test]
    fn single_attempt_never_retries() {
        let (policy, _) = policy(RetryConfig::default().with_max_attempts(1));

        let result: Result<(), _> = policy.execute(|attempt| {
            assert!(attempt.is_last());
            Err(TestError::new("once"))
        });

        assert_eq!(result, Err(TestError::new("once")));
    }

    #[test]
    fn next_attempt_uses_jittered_delays() {
        let (policy, _) = policy(RetryConfig::default().with_jitter(true));
        let policy = policy.with_rnd(Rnd::new_fixed(0.0));
        let mut delays = policy.delays();

        let next = policy.next_attempt(policy.first_attempt(), &TestError::new("x"), &mut delays);

        assert_eq!(
            next,
            ControlFlow::Continue(NextAttempt {
                attempt: Attempt::new(1, false),
                delay: Duration::from_millis(375),
            })
        );
    }

    #[tokio::test]
    async fn execute_async_retries_with_timer_delays() {
        let control = ClockControl::new().auto_advance_timers(true);
        let context = ResilienceContext::new(control.to_clock());
        let policy = RetryPolicy::<TestError>::new(RetryConfig::default(), &context).unwrap();
        let start = control.to_clock().instant();

        let result = policy
            .execute_async(|attempt| async move {
                if attempt.index() == 2 {
                    Ok("done")
                } else {
                    Err(TestError::new("transient"))
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(control.to_clock().instant() - start, Duration::from_secs(1));
    }

    #[test]
    fn retry_emits_log() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(ClockControl::new().to_clock()).name("payments").enable_logs();
        let policy = RetryPolicy::<TestError>::new(RetryConfig::default().with_max_attempts(2), &context).unwrap();

        let _ = policy.execute(|_| Err::<(), _>(TestError::new("transient")));

        capture.assert_contains("breakwater::retry");
        capture.assert_contains("WARN");
        capture.assert_contains("pipeline.name=payments");
        capture.assert_contains("resilience.attempt.index=1");
        capture.assert_contains("resilience.attempt.is_last=true");
        capture.assert_contains("resilience.retry.delay=0.5");
    }

    #[cfg(not(miri))]
    #[test]
    fn retry_reports_metric() {
        let tester = MetricTester::new();
        let context = ResilienceContext::new(ClockControl::new().to_clock()).enable_metrics(tester.meter_provider());
        let policy = RetryPolicy::<TestError>::new(RetryConfig::default().with_max_attempts(2), &context).unwrap();

        let _ = policy.execute(|_| Err::<(), _>(TestError::new("transient")));

        tester.assert_attributes_contain(&[
            KeyValue::new(STRATEGY_NAME, RETRY_STRATEGY_NAME),
            KeyValue::new(EVENT_NAME, RETRY_EVENT_NAME),
            KeyValue::new(ATTEMPT_INDEX, 1_i64),
            KeyValue::new(ATTEMPT_IS_LAST, true),
        ]);
    }
}
