// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::pin::pin;

use futures_util::future::{Either, select};

use crate::ExecuteError;
use crate::breaker::{CircuitBreaker, CircuitState, Permit};
use crate::retry::{Attempt, Delays, NextAttempt, RetryPolicy};
use crate::telemetry::TelemetryHelper;

pub(crate) const FALLBACK_STRATEGY_NAME: &str = "fallback";
pub(crate) const FALLBACK_EVENT_NAME: &str = "fallback";

/// Runs operations through a circuit breaker and a retry policy, with an optional fallback.
///
/// For every call:
///
/// 1. The breaker is asked for a permit. When it refuses, the operation is never invoked and
///    the call fails with [`ExecuteError::CallNotPermitted`].
/// 2. Each attempt is timed with the clock and its outcome recorded in the breaker, including
///    attempts that are retried afterwards.
/// 3. After a failed attempt, the retry policy decides whether to try again. An open breaker
///    stops retrying before the backoff wait. After the wait, the breaker is asked for the
///    permit of the next attempt; when it refuses, retrying stops.
/// 4. When no further attempt is made, the call fails with [`ExecuteError::OperationFailed`]
///    carrying the last error.
///
/// The `*_with_fallback` variants hand every failure to a fallback whose result replaces the
/// error. A failing fallback yields [`ExecuteError::FallbackFailed`].
///
/// # Examples
///
/// ```
/// use breakwater::breaker::{BreakerConfig, CircuitBreaker};
/// use breakwater::retry::{RetryConfig, RetryPolicy};
/// use breakwater::{Executor, ResilienceContext};
/// use breakwater_clock::Clock;
///
/// let context = ResilienceContext::new(Clock::new_system());
/// let breaker = CircuitBreaker::new("quotes", BreakerConfig::default(), &context)?;
/// let retry = RetryPolicy::new(RetryConfig::default().with_max_attempts(1), &context)?;
/// let executor = Executor::new(breaker, retry);
///
/// let quote = executor.execute_with_fallback(
///     |_attempt| Err::<u32, String>("quote service unavailable".to_string()),
///     |_error| Ok(0),
/// );
///
/// assert_eq!(quote.ok(), Some(0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Executor<E> {
    breaker: CircuitBreaker,
    retry: RetryPolicy<E>,
    telemetry: TelemetryHelper,
}

impl<E> Executor<E> {
    /// Binds a breaker and a retry policy.
    #[must_use]
    pub fn new(breaker: CircuitBreaker, retry: RetryPolicy<E>) -> Self {
        Self {
            telemetry: retry.telemetry().with_strategy(FALLBACK_STRATEGY_NAME),
            breaker,
            retry,
        }
    }

    /// The breaker guarding the operations.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The policy retrying failed attempts.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy<E> {
        &self.retry
    }

    /// Runs `operation`, blocking the calling thread during backoff waits.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::CallNotPermitted`] when the breaker refuses the first attempt
    /// and [`ExecuteError::OperationFailed`] when the last attempt fails.
    pub fn execute<T>(&self, mut operation: impl FnMut(Attempt) -> Result<T, E>) -> Result<T, ExecuteError<E>> {
        let mut permit = self.breaker.try_acquire()?;
        let mut delays = self.retry.delays();
        let mut attempt = self.retry.first_attempt();

        loop {
            let stopwatch = self.breaker.clock().stopwatch();
            let result = operation(attempt);
            permit.record(self.breaker.classify(result.is_ok(), stopwatch.elapsed()));

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let ControlFlow::Continue(next) = self.next_attempt(attempt, &error, &mut delays) else {
                return Err(operation_failed(error, attempt));
            };

            self.retry.clock().sleep(next.delay);

            let Some(next_permit) = self.resume(next) else {
                return Err(operation_failed(error, attempt));
            };
            attempt = next.attempt;
            permit = next_permit;
        }
    }

    /// Runs `operation` and hands any failure to `fallback`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::FallbackFailed`] when the fallback fails.
    pub fn execute_with_fallback<T>(
        &self,
        operation: impl FnMut(Attempt) -> Result<T, E>,
        fallback: impl FnOnce(ExecuteError<E>) -> Result<T, E>,
    ) -> Result<T, ExecuteError<E>> {
        self.execute(operation).or_else(|error| {
            self.emit_fallback(&error);
            fallback(error).map_err(ExecuteError::FallbackFailed)
        })
    }

    /// Runs the futures returned by `operation`, waiting between attempts with timer delays.
    ///
    /// Dropping the returned future stops the call. The outcome of an interrupted attempt is
    /// not recorded and its half-open probe slot, if any, is returned to the breaker.
    ///
    /// # Errors
    ///
    /// Same as [`execute`][Self::execute].
    pub async fn execute_async<T, F, Fut>(&self, mut operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.breaker.try_acquire()?;
        let mut delays = self.retry.delays();
        let mut attempt = self.retry.first_attempt();

        loop {
            let stopwatch = self.breaker.clock().stopwatch();
            let result = operation(attempt).await;
            permit.record(self.breaker.classify(result.is_ok(), stopwatch.elapsed()));

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let ControlFlow::Continue(next) = self.next_attempt(attempt, &error, &mut delays) else {
                return Err(operation_failed(error, attempt));
            };

            self.retry.clock().delay(next.delay).await;

            let Some(next_permit) = self.resume(next) else {
                return Err(operation_failed(error, attempt));
            };
            attempt = next.attempt;
            permit = next_permit;
        }
    }

    /// Runs `operation` asynchronously and hands any failure to `fallback`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::FallbackFailed`] when the fallback fails.
    pub async fn execute_async_with_fallback<T, F, Fut, FB, FutB>(&self, operation: F, fallback: FB) -> Result<T, ExecuteError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(ExecuteError<E>) -> FutB,
        FutB: Future<Output = Result<T, E>>,
    {
        match self.execute_async(operation).await {
            Ok(value) => Ok(value),
            Err(error) => {
                self.emit_fallback(&error);
                fallback(error).await.map_err(ExecuteError::FallbackFailed)
            }
        }
    }

    /// Like [`execute_async_with_fallback`][Self::execute_async_with_fallback], but stops as
    /// soon as `cancellation` completes.
    ///
    /// A canceled call neither retries nor invokes the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::Canceled`] when `cancellation` completes first.
    pub async fn execute_async_with_cancellation<T, F, Fut, FB, FutB>(
        &self,
        operation: F,
        fallback: FB,
        cancellation: impl Future<Output = ()>,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(ExecuteError<E>) -> FutB,
        FutB: Future<Output = Result<T, E>>,
    {
        let call = pin!(self.execute_async_with_fallback(operation, fallback));
        let cancellation = pin!(cancellation);

        match select(call, cancellation).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(ExecuteError::Canceled),
        }
    }

    /// Asks the retry policy for another attempt. No attempt follows while the breaker is open.
    fn next_attempt(&self, attempt: Attempt, error: &E, delays: &mut Delays) -> ControlFlow<(), NextAttempt> {
        let next = self.retry.next_attempt(attempt, error, delays)?;

        if self.breaker.state() == CircuitState::Open {
            return ControlFlow::Break(());
        }

        ControlFlow::Continue(next)
    }

    /// Takes the permit for `next` once its backoff has elapsed. The retry is reported only
    /// when the breaker grants it.
    fn resume(&self, next: NextAttempt) -> Option<Permit> {
        let permit = self.breaker.try_acquire().ok()?;
        self.retry.emit_retry(next);

        Some(permit)
    }

    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "only read when telemetry is compiled in")
    )]
    fn emit_fallback(&self, error: &ExecuteError<E>) {
        let reason = match error {
            ExecuteError::CallNotPermitted(_) => "call_not_permitted",
            _ => "operation_failed",
        };

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "breakwater.fallback",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.fallback.reason = reason,
            );
        }

        #[cfg(any(feature = "metrics", test))]
        self.telemetry.report_event(FALLBACK_EVENT_NAME, &[opentelemetry::KeyValue::new(FALLBACK_REASON, reason)]);
    }
}

#[cfg(any(feature = "metrics", test))]
const FALLBACK_REASON: &str = "resilience.fallback.reason";

fn operation_failed<E>(source: E, last_attempt: Attempt) -> ExecuteError<E> {
    ExecuteError::OperationFailed {
        source,
        attempts: last_attempt.count(),
    }
}

impl<E> Clone for Executor<E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            retry: self.retry.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

impl<E> Debug for Executor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
