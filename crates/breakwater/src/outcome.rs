// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

/// The classified result of a single attempt of a protected operation.
///
/// An outcome is produced exactly once per attempt and recorded into a circuit breaker.
/// Use [`CircuitBreaker::classify`][crate::breaker::CircuitBreaker::classify] to derive the
/// `slow` flag from the breaker's slow-call threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    succeeded: bool,
    slow: bool,
    duration: Duration,
    timestamp: Instant,
}

impl CallOutcome {
    /// Creates a new outcome.
    #[must_use]
    pub fn new(succeeded: bool, slow: bool, duration: Duration, timestamp: Instant) -> Self {
        Self {
            succeeded,
            slow,
            duration,
            timestamp,
        }
    }

    /// Whether the attempt completed without an error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Whether the attempt took at least the configured slow-call threshold.
    #[must_use]
    pub fn slow(&self) -> bool {
        self.slow
    }

    /// How long the attempt took.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// When the attempt finished.
    #[must_use]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}
