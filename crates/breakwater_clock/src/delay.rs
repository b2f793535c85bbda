// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::Clock;
#[cfg(any(feature = "test-util", test))]
use crate::timers::TimerKey;

/// A future that completes once its duration has passed on a [`Clock`].
///
/// The deadline is computed when the delay is first polled.
///
/// # Runtime
///
/// A delay created from the system clock is backed by a Tokio timer. Polling it outside of a
/// Tokio runtime with the time driver enabled panics. Delays of [`Duration::ZERO`] never touch
/// the runtime and complete immediately.
///
/// A delay created from a controlled clock completes once the controlling `ClockControl` moves
/// time past the deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater_clock::{Clock, Delay};
///
/// async fn backoff(clock: &Clock, attempt: u32) {
///     Delay::new(clock, Duration::from_millis(100) * attempt).await;
/// }
/// # let _ = backoff;
/// ```
#[derive(Debug)]
pub struct Delay {
    clock: Clock,
    duration: Duration,
    sleep: Option<Pin<Box<tokio::time::Sleep>>>,
    #[cfg(any(feature = "test-util", test))]
    current_timer: Option<TimerKey>,
}

impl Delay {
    /// Creates a new delay that completes after the specified duration.
    ///
    /// A zero duration is ready on first poll and [`Duration::MAX`] is never ready.
    ///
    /// [`Clock::delay`] is the shorter spelling.
    #[must_use]
    pub fn new(clock: &Clock, duration: Duration) -> Self {
        Self {
            clock: clock.clone(),
            duration,
            sleep: None,
            #[cfg(any(feature = "test-util", test))]
            current_timer: None,
        }
    }

    fn poll_system(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let duration = self.duration;
        let sleep = self.sleep.get_or_insert_with(|| Box::pin(tokio::time::sleep(duration)));

        sleep.as_mut().poll(cx)
    }

    #[cfg(any(feature = "test-util", test))]
    fn poll_controlled(&mut self, control: &crate::ClockControl, cx: &mut Context<'_>) -> Poll<()> {
        match self.current_timer {
            None => {
                if let Some(deadline) = control.instant().checked_add(self.duration) {
                    self.current_timer = Some(control.register_timer(deadline, cx.waker().clone()));
                } else {
                    // Past the maximum instant; this delay never completes.
                    self.duration = Duration::MAX;
                }

                Poll::Pending
            }
            Some(key) if key.deadline() <= control.instant() => {
                self.current_timer = None;
                control.unregister_timer(key);

                Poll::Ready(())
            }
            Some(_) => Poll::Pending,
        }
    }
}

impl Future for Delay {
    type Output = ();

    #[cfg_attr(test, mutants::skip)] // some mutations never finish and cause timeouts
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.duration.is_zero() {
            return Poll::Ready(());
        }

        if this.duration == Duration::MAX {
            return Poll::Pending;
        }

        #[cfg(any(feature = "test-util", test))]
        if let crate::state::ClockState::ClockControl(control) = this.clock.clock_state() {
            let control = control.clone();
            return this.poll_controlled(&control, cx);
        }

        this.poll_system(cx)
    }
}

#[cfg(any(feature = "test-util", test))]
impl Drop for Delay {
    fn drop(&mut self) {
        if let (Some(key), crate::state::ClockState::ClockControl(control)) = (self.current_timer, self.clock.clock_state()) {
            control.unregister_timer(key);
        }
    }
}
