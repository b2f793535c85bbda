// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use super::Clock;

/// Measures elapsed time against a [`Clock`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater_clock::Clock;
///
/// let clock = Clock::new_system();
/// let stopwatch = clock.stopwatch();
/// let total: u64 = (1..=1000).sum();
///
/// assert_eq!(total, 500_500);
/// assert!(stopwatch.elapsed() < Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct Stopwatch {
    clock: Clock,
    start: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch that starts measuring from the current instant of `clock`.
    ///
    /// [`Clock::stopwatch`] is the shorter spelling.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            start: clock.instant(),
        }
    }

    /// Returns the instant at which the stopwatch started.
    #[must_use]
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Time passed on the clock since the stopwatch started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.instant().saturating_duration_since(self.start)
    }
}

impl From<Stopwatch> for Duration {
    fn from(stopwatch: Stopwatch) -> Self {
        stopwatch.elapsed()
    }
}
