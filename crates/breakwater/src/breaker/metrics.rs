// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::CircuitState;
use crate::WindowSnapshot;

/// A point-in-time view of a circuit breaker.
///
/// While half-open, the counters describe the probe window; otherwise they describe the
/// main sliding window. The rates are `None` until enough calls are buffered for the breaker
/// to evaluate them: the minimum number of calls when closed, all permitted probes when
/// half-open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerMetrics {
    state: CircuitState,
    snapshot: WindowSnapshot,
    evaluated: bool,
    not_permitted_calls: u64,
}

impl BreakerMetrics {
    pub(crate) fn new(state: CircuitState, snapshot: WindowSnapshot, required_calls: u32, not_permitted_calls: u64) -> Self {
        Self {
            state,
            snapshot,
            evaluated: snapshot.total() >= required_calls,
            not_permitted_calls,
        }
    }

    /// The state of the breaker when the metrics were taken.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Percentage of failed calls.
    #[must_use]
    pub fn failure_rate(&self) -> Option<f32> {
        self.snapshot.failure_rate().filter(|_| self.evaluated)
    }

    /// Percentage of slow calls.
    #[must_use]
    pub fn slow_call_rate(&self) -> Option<f32> {
        self.snapshot.slow_call_rate().filter(|_| self.evaluated)
    }

    /// Number of buffered outcomes.
    #[must_use]
    pub fn buffered_calls(&self) -> u32 {
        self.snapshot.total()
    }

    /// Number of buffered failed outcomes.
    #[must_use]
    pub fn failed_calls(&self) -> u32 {
        self.snapshot.failures()
    }

    /// Number of buffered successful outcomes.
    #[must_use]
    pub fn successful_calls(&self) -> u32 {
        self.snapshot.successes()
    }

    /// Number of buffered slow outcomes.
    #[must_use]
    pub fn slow_calls(&self) -> u32 {
        self.snapshot.slow_calls()
    }

    /// Number of calls rejected since the breaker was created or last reset.
    #[must_use]
    pub fn not_permitted_calls(&self) -> u64 {
        self.not_permitted_calls
    }
}
