// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Count-based circuit breaker.
//!
//! A [`CircuitBreaker`] watches the outcomes of the most recent calls and stops admitting
//! calls when too many of them fail or run slowly. The primary types are:
//!
//! - [`CircuitBreaker`] admits calls and records their outcomes
//! - [`BreakerConfig`] holds the thresholds and window sizes
//! - [`Permit`] represents one admitted call
//!
//! # States and Transitions
//!
//! ```text
//! ┌────────┐   failure or slow-call rate reached   ┌──────────┐
//! │ Closed │ ─────────────────────────────────────▶│   Open   │
//! └────────┘                                       └──────────┘
//!      ▲                                             ▲      │
//!      │          probes unhealthy                   │      │ wait elapsed
//!      │        ┌────────────────────────────────────┘      │
//!      │        │                                           ▼
//!      │   ┌──────────┐                                     │
//!      └───│Half-Open │◀────────────────────────────────────┘
//!  probes  └──────────┘
//!  healthy
//! ```
//!
//! - **Closed**: every call is admitted and its outcome lands in a sliding window of the last
//!   `sliding_window_size` outcomes. Once at least `minimum_number_of_calls` outcomes are
//!   buffered, the breaker opens as soon as the failure rate reaches
//!   `failure_rate_threshold` or the slow-call rate reaches `slow_call_rate_threshold`.
//! - **Open**: every call is rejected with [`CallNotPermitted`]. After
//!   `wait_duration_in_open_state`, the breaker moves to half-open if automatic transition is
//!   enabled. The transition happens on the next call or state query, no background task is
//!   involved.
//! - **Half-Open**: up to `permitted_number_of_calls_in_half_open_state` probe calls are
//!   admitted. Once all of their outcomes are recorded, the breaker closes if the probes
//!   stayed below both thresholds and reopens otherwise.
//!
//! Every transition clears the windows it leaves behind.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use breakwater::ResilienceContext;
//! use breakwater::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
//! use breakwater_clock::Clock;
//!
//! let context = ResilienceContext::new(Clock::new_system());
//! let config = BreakerConfig::default()
//!     .with_sliding_window_size(5)
//!     .with_minimum_number_of_calls(3);
//! let breaker = CircuitBreaker::new("inventory", config, &context)?;
//!
//! for _ in 0..3 {
//!     let permit = breaker.try_acquire()?;
//!     permit.record(breaker.classify(false, Duration::from_millis(20)));
//! }
//!
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(breaker.try_acquire().is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
pub(crate) mod constants;
mod engine;
mod metrics;
mod permit;
mod state;
mod telemetry;

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use breakwater_clock::Clock;
pub use config::BreakerConfig;
use engine::{EngineCore, EngineOptions, EnterResult, Ticket, Transition};
pub use metrics::BreakerMetrics;
pub use permit::Permit;
pub use state::CircuitState;
use telemetry::BreakerTelemetry;

use crate::{CallNotPermitted, CallOutcome, ConfigError, ResilienceContext};

/// A count-based circuit breaker.
///
/// Cloning is cheap and every clone shares the same state. All operations are safe to call
/// concurrently from any number of threads.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

#[derive(Debug)]
struct BreakerInner {
    name: Cow<'static, str>,
    config: BreakerConfig,
    clock: Clock,
    engine: EngineCore,
    telemetry: BreakerTelemetry,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid.
    pub fn new(name: impl Into<Cow<'static, str>>, config: BreakerConfig, context: &ResilienceContext) -> Result<Self, ConfigError> {
        let sizes = config.validated()?;
        let name = name.into();
        let clock = context.clock().clone();

        Ok(Self {
            inner: Arc::new(BreakerInner {
                engine: EngineCore::new(EngineOptions::new(&config, sizes), clock.clone()),
                telemetry: BreakerTelemetry::new(context.create_telemetry(name.clone())),
                name,
                config,
                clock,
            }),
        })
    }

    /// The breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration the breaker was created with.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig {
        &self.inner.config
    }

    /// Asks for permission to perform a call.
    ///
    /// # Errors
    ///
    /// Returns [`CallNotPermitted`] when the breaker is open and still waiting, or half-open
    /// with every probe slot taken.
    pub fn try_acquire(&self) -> Result<Permit, CallNotPermitted> {
        match self.inner.engine.enter() {
            EnterResult::Accepted { ticket, transition } => {
                self.report(transition);
                Ok(Permit::new(self.clone(), ticket))
            }
            EnterResult::Rejected { state } => {
                self.inner.telemetry.rejected(state);
                Err(CallNotPermitted::new(self.inner.name.as_ref(), state))
            }
        }
    }

    /// Records an outcome without a permit.
    ///
    /// The outcome is attributed to the current state: while half-open it counts as a probe
    /// result, while open it is ignored.
    pub fn record_outcome(&self, outcome: CallOutcome) {
        self.complete(None, outcome);
    }

    /// Builds the outcome of a call that ran for `duration`, classifying it as slow against
    /// the configured threshold and stamping it with the current instant.
    #[must_use]
    pub fn classify(&self, succeeded: bool, duration: Duration) -> CallOutcome {
        let slow = duration >= self.inner.config.slow_call_duration_threshold;
        CallOutcome::new(succeeded, slow, duration, self.inner.clock.instant())
    }

    /// The current state, after applying a pending automatic transition to half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let (state, transition) = self.inner.engine.state();
        self.report(transition);
        state
    }

    /// A snapshot of the counters, after applying a pending automatic transition to half-open.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        let (metrics, transition) = self.inner.engine.metrics();
        self.report(transition);
        metrics
    }

    /// Returns the breaker to its initial state: closed, with empty windows and a zero
    /// rejection count.
    pub fn reset(&self) {
        self.report(Some(self.inner.engine.reset()));
    }

    /// Opens the breaker and starts the open-state wait.
    pub fn transition_to_open_state(&self) {
        self.report(Some(self.inner.engine.force(CircuitState::Open)));
    }

    /// Moves the breaker to half-open with all probe slots free.
    pub fn transition_to_half_open_state(&self) {
        self.report(Some(self.inner.engine.force(CircuitState::HalfOpen)));
    }

    /// Closes the breaker with an empty window.
    pub fn transition_to_closed_state(&self) {
        self.report(Some(self.inner.engine.force(CircuitState::Closed)));
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    fn complete(&self, ticket: Option<Ticket>, outcome: CallOutcome) {
        self.report(self.inner.engine.record(ticket, outcome));
    }

    fn release(&self, ticket: Ticket) {
        self.inner.engine.release(ticket);
    }

    fn report(&self, transition: Option<Transition>) {
        if let Some(transition) = transition {
            self.inner.telemetry.transitioned(transition);
        }
    }
}
