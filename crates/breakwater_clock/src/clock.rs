// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::state::ClockState;

/// The source of time for breakers, retry policies and anything else that waits or measures.
///
/// Every component that needs the current time, needs to measure a duration or needs to wait
/// receives a `Clock` instead of calling into [`std::time`] or [`std::thread::sleep`] directly.
/// In production the clock reads the operating system clocks. In tests, a clock created from a
/// `ClockControl` (available with the `test-util` feature) only moves when the test moves it.
///
/// # Cloning and shared state
///
/// Cloning a clock is inexpensive (just an `Arc` clone) and all clones share the same state.
/// Time adjustments performed through a `ClockControl` are observed by every clone created
/// from it.
///
/// # Waiting
///
/// The clock supports two ways of waiting:
///
/// - [`sleep`][Self::sleep] blocks the calling thread. With a controlled clock, the sleep returns
///   immediately after advancing the controlled time by the requested duration.
/// - [`delay`][Self::delay] returns a [`Delay`][crate::Delay] future. The system clock backs
///   the future by a Tokio timer, so it must be awaited inside a Tokio runtime.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater_clock::Clock;
///
/// fn timed_lookup(clock: &Clock) -> Duration {
///     let stopwatch = clock.stopwatch();
///     let _balance = 42;
///     stopwatch.elapsed()
/// }
///
/// assert!(timed_lookup(&Clock::new_system()) < Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct Clock(Arc<ClockState>);

impl Clock {
    /// Creates a clock that reads the operating system clocks.
    #[must_use]
    pub fn new_system() -> Self {
        Self(Arc::new(ClockState::System))
    }

    /// Creates a controlled clock that only moves when slept on.
    ///
    /// Shorthand for `ClockControl::new().to_clock()` when the test does not need to advance
    /// time itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use breakwater_clock::Clock;
    ///
    /// let clock = Clock::new_frozen();
    ///
    /// assert_eq!(clock.instant(), clock.instant());
    /// ```
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn new_frozen() -> Self {
        crate::ClockControl::new().to_clock()
    }

    #[cfg(any(feature = "test-util", test))]
    pub(crate) fn with_control(control: &crate::ClockControl) -> Self {
        Self(Arc::new(ClockState::ClockControl(control.clone())))
    }

    /// Retrieves the current system time.
    ///
    /// > **Note**: The system time is not monotonic. For measuring elapsed time, use
    /// > [`Stopwatch`][crate::Stopwatch] or [`instant`][Self::instant].
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        match self.clock_state() {
            #[cfg(any(feature = "test-util", test))]
            ClockState::ClockControl(control) => control.system_time(),
            ClockState::System => SystemTime::now(),
        }
    }

    /// Retrieves the current monotonic [`Instant`].
    ///
    /// > **Important**: Compute elapsed time with [`Instant::saturating_duration_since`]
    /// > against another instant retrieved from this clock. `Instant::elapsed` bypasses the
    /// > clock and does not respect controlled time.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match self.clock_state() {
            #[cfg(any(feature = "test-util", test))]
            ClockState::ClockControl(control) => control.instant(),
            ClockState::System => Instant::now(),
        }
    }

    /// Blocks the current thread for the given duration.
    ///
    /// A zero duration returns immediately. With a controlled clock, the controlled time is
    /// advanced by `duration` and the call returns without blocking.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use breakwater_clock::Clock;
    ///
    /// let clock = Clock::new_frozen();
    /// let stopwatch = clock.stopwatch();
    ///
    /// clock.sleep(Duration::from_secs(30));
    ///
    /// assert_eq!(stopwatch.elapsed(), Duration::from_secs(30));
    /// ```
    pub fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        match self.clock_state() {
            #[cfg(any(feature = "test-util", test))]
            ClockState::ClockControl(control) => control.advance(duration),
            ClockState::System => std::thread::sleep(duration),
        }
    }

    /// Creates a new [`Delay`][crate::Delay] that completes after the specified duration.
    ///
    /// A zero delay is ready on first poll; a [`Duration::MAX`] delay never completes.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use breakwater_clock::Clock;
    ///
    /// # async fn delay_example(clock: &Clock) {
    /// let stopwatch = clock.stopwatch();
    ///
    /// clock.delay(Duration::from_millis(10)).await;
    ///
    /// assert!(stopwatch.elapsed() >= Duration::from_millis(10));
    /// # }
    /// ```
    #[must_use]
    pub fn delay(&self, duration: Duration) -> crate::Delay {
        crate::Delay::new(self, duration)
    }

    /// Creates a new [`Stopwatch`][crate::Stopwatch] that starts measuring elapsed time.
    #[must_use]
    pub fn stopwatch(&self) -> crate::Stopwatch {
        crate::Stopwatch::new(self)
    }

    pub(crate) fn clock_state(&self) -> &ClockState {
        self.0.as_ref()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new_system()
    }
}

impl AsRef<Self> for Clock {
    fn as_ref(&self) -> &Self {
        self
    }
}
