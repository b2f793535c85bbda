// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time::{Duration, Instant, SystemTime};

use crate::Clock;
use crate::timers::{TimerKey, Timers};

/// Moves time by hand so tests of breakers and retries run instantly and deterministically.
///
/// `ClockControl` is available when the `test-util` feature is enabled. Clocks created with
/// [`to_clock`][Self::to_clock] observe the controlled time, and [`Delay`][crate::Delay]
/// futures created from them complete only when the control moves time past their deadline.
///
/// The initial system time is the UNIX epoch.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater_clock::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
/// let start = clock.instant();
///
/// control.advance(Duration::from_secs(1));
///
/// assert_eq!(clock.instant() - start, Duration::from_secs(1));
/// ```
///
/// # Production code and `ClockControl`
///
/// Never enable the `test-util` feature in production code. Always enable it only for
/// `dev-dependencies`.
#[derive(Debug, Clone, Default)]
pub struct ClockControl {
    state: Arc<Mutex<State>>,
}

impl ClockControl {
    /// Creates a new `ClockControl` with no auto-advance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts the `ClockControl` to a [`Clock`].
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock::with_control(self)
    }

    /// Sets the duration by which the clock advances every time the current time is read.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use breakwater_clock::ClockControl;
    ///
    /// let clock = ClockControl::new()
    ///     .auto_advance(Duration::from_millis(10))
    ///     .to_clock();
    ///
    /// let stopwatch = clock.stopwatch();
    ///
    /// assert_eq!(stopwatch.elapsed(), Duration::from_millis(10));
    /// ```
    #[must_use]
    pub fn auto_advance(self, duration: Duration) -> Self {
        self.with_state(|s| s.auto_advance = duration);
        self
    }

    /// Determines whether registered timers fire as soon as they are registered.
    ///
    /// When enabled, awaiting a [`Delay`][crate::Delay] moves the controlled time forward to the
    /// deadline of the delay. This makes asynchronous retry loops run without manual advancing.
    #[must_use]
    pub fn auto_advance_timers(self, enabled: bool) -> Self {
        self.with_state(|s| s.auto_advance_timers = enabled);
        self
    }

    /// Moves time forward by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Moves time forward by `duration` and fires every timer that became due.
    pub fn advance(&self, duration: Duration) {
        self.with_state(|s| s.advance(duration));
    }

    pub(crate) fn system_time(&self) -> SystemTime {
        self.with_state(State::system_time_now)
    }

    pub(crate) fn instant(&self) -> Instant {
        self.with_state(State::instant_now)
    }

    pub(crate) fn register_timer(&self, when: Instant, waker: Waker) -> TimerKey {
        self.with_state(|s| {
            let key = s.timers.register(when, waker);
            s.evaluate_timers();
            key
        })
    }

    pub(crate) fn unregister_timer(&self, key: TimerKey) {
        self.with_state(|s| s.timers.unregister(key));
    }

    #[cfg(test)]
    pub(crate) fn timers_len(&self) -> usize {
        self.with_state(|s| s.timers.len())
    }

    fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut State) -> R,
    {
        f(&mut self.state.lock().expect("acquiring lock must always succeed"))
    }
}

impl From<ClockControl> for Clock {
    fn from(control: ClockControl) -> Self {
        control.to_clock()
    }
}

impl From<&ClockControl> for Clock {
    fn from(control: &ClockControl) -> Self {
        control.to_clock()
    }
}

#[derive(Debug)]
struct State {
    instant: Instant,
    system_time: SystemTime,
    timers: Timers,
    auto_advance: Duration,
    auto_advance_timers: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            instant: Instant::now(),
            system_time: SystemTime::UNIX_EPOCH,
            timers: Timers::default(),
            auto_advance: Duration::ZERO,
            auto_advance_timers: false,
        }
    }
}

impl State {
    #[cfg_attr(test, mutants::skip)] // causes test timeout
    fn advance(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        self.instant = self.instant.checked_add(duration).expect(OUTSIDE_RANGE_MESSAGE);
        self.system_time = self.system_time.checked_add(duration).expect(OUTSIDE_RANGE_MESSAGE);
        self.evaluate_timers();
    }

    fn evaluate_timers(&mut self) {
        self.timers.wake_due(self.instant);

        if !self.auto_advance_timers {
            return;
        }

        while let Some(next) = self.timers.next_deadline() {
            let remaining = next.saturating_duration_since(self.instant);

            self.instant = self.instant.checked_add(remaining).expect(OUTSIDE_RANGE_MESSAGE);
            self.system_time = self.system_time.checked_add(remaining).expect(OUTSIDE_RANGE_MESSAGE);
            self.timers.wake_due(self.instant);
        }
    }

    fn system_time_now(&mut self) -> SystemTime {
        let time = self.system_time;
        self.advance(self.auto_advance);
        time
    }

    fn instant_now(&mut self) -> Instant {
        let time = self.instant;
        self.advance(self.auto_advance);
        time
    }
}

static OUTSIDE_RANGE_MESSAGE: &str = "moving the clock outside of the supported time range is not possible";
