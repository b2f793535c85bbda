// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZeroU32;

use crate::CallOutcome;

/// A count-based sliding window over the most recent call outcomes.
///
/// The window holds at most `capacity` outcomes in a ring buffer that is allocated once. The
/// aggregate counters are maintained incrementally: inserting into an occupied slot first
/// subtracts the evicted outcome, so [`snapshot`][Self::snapshot] is O(1) and always equals the
/// sum over the occupied slots.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
/// use std::time::{Duration, Instant};
///
/// use breakwater::{CallOutcome, SlidingWindow};
///
/// let mut window = SlidingWindow::new(NonZeroU32::new(2).unwrap());
/// let now = Instant::now();
///
/// window.insert(CallOutcome::new(false, false, Duration::ZERO, now));
/// window.insert(CallOutcome::new(true, false, Duration::ZERO, now));
/// window.insert(CallOutcome::new(true, true, Duration::ZERO, now));
///
/// let snapshot = window.snapshot();
/// assert_eq!(snapshot.total(), 2);
/// assert_eq!(snapshot.failures(), 0);
/// assert_eq!(snapshot.slow_calls(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    slots: Box<[Option<CallOutcome>]>,
    cursor: usize,
    filled: u32,
    successes: u32,
    failures: u32,
    slow_calls: u32,
    total_insertions: u64,
}

impl SlidingWindow {
    /// Creates an empty window that holds up to `capacity` outcomes.
    #[must_use]
    pub fn new(capacity: NonZeroU32) -> Self {
        Self {
            slots: vec![None; capacity.get() as usize].into_boxed_slice(),
            cursor: 0,
            filled: 0,
            successes: 0,
            failures: 0,
            slow_calls: 0,
            total_insertions: 0,
        }
    }

    /// The maximum number of outcomes the window holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of outcomes inserted since creation or the last [`clear`][Self::clear].
    #[must_use]
    pub fn total_insertions(&self) -> u64 {
        self.total_insertions
    }

    /// Records an outcome, evicting the oldest one when the window is full.
    pub fn insert(&mut self, outcome: CallOutcome) {
        match self.slots[self.cursor].replace(outcome) {
            Some(evicted) => self.subtract(evicted),
            None => self.filled = self.filled.saturating_add(1),
        }

        self.add(outcome);
        self.cursor = self.cursor.wrapping_add(1);
        if self.cursor == self.slots.len() {
            self.cursor = 0;
        }
        self.total_insertions = self.total_insertions.saturating_add(1);
    }

    /// Returns the aggregate counters over the occupied slots.
    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            total: self.filled,
            successes: self.successes,
            failures: self.failures,
            slow_calls: self.slow_calls,
        }
    }

    /// Empties the window and resets every counter.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.cursor = 0;
        self.filled = 0;
        self.successes = 0;
        self.failures = 0;
        self.slow_calls = 0;
        self.total_insertions = 0;
    }

    fn add(&mut self, outcome: CallOutcome) {
        if outcome.succeeded() {
            self.successes = self.successes.saturating_add(1);
        } else {
            self.failures = self.failures.saturating_add(1);
        }

        if outcome.slow() {
            self.slow_calls = self.slow_calls.saturating_add(1);
        }
    }

    fn subtract(&mut self, outcome: CallOutcome) {
        if outcome.succeeded() {
            self.successes = self.successes.saturating_sub(1);
        } else {
            self.failures = self.failures.saturating_sub(1);
        }

        if outcome.slow() {
            self.slow_calls = self.slow_calls.saturating_sub(1);
        }
    }
}

/// Aggregate counters of a [`SlidingWindow`] at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSnapshot {
    total: u32,
    successes: u32,
    failures: u32,
    slow_calls: u32,
}

impl WindowSnapshot {
    /// Number of buffered outcomes.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of buffered successful outcomes.
    #[must_use]
    pub fn successes(&self) -> u32 {
        self.successes
    }

    /// Number of buffered failed outcomes.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Number of buffered slow outcomes, successful or not.
    #[must_use]
    pub fn slow_calls(&self) -> u32 {
        self.slow_calls
    }

    /// Percentage of failed outcomes, or `None` when the window is empty.
    #[must_use]
    pub fn failure_rate(&self) -> Option<f32> {
        percentage(self.failures, self.total)
    }

    /// Percentage of slow outcomes, or `None` when the window is empty.
    #[must_use]
    pub fn slow_call_rate(&self) -> Option<f32> {
        percentage(self.slow_calls, self.total)
    }

    /// Whether the failure rate or the slow-call rate reaches its threshold (in percent).
    ///
    /// Compares `count * 100 >= threshold * total` so that no rate is rounded before the
    /// comparison. An empty snapshot never exceeds.
    #[must_use]
    pub(crate) fn exceeds(&self, failure_rate_threshold: f32, slow_call_rate_threshold: f32) -> bool {
        if self.total == 0 {
            return false;
        }

        let total = f64::from(self.total);
        let reached = |count: u32, threshold: f32| f64::from(count) * 100.0 >= f64::from(threshold) * total;

        reached(self.failures, failure_rate_threshold) || reached(self.slow_calls, slow_call_rate_threshold)
    }
}

#[expect(clippy::cast_possible_truncation, reason = "a percentage always fits into f32")]
fn percentage(count: u32, total: u32) -> Option<f32> {
    (total > 0).then(|| (f64::from(count) * 100.0 / f64::from(total)) as f32)
}
