// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::task::Waker;
use std::time::Instant;

/// Identifies a registered timer.
///
/// Keys order by deadline first, so the first key in the map is the next timer to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey {
    deadline: Instant,
    sequence: u64,
}

impl TimerKey {
    pub fn deadline(self) -> Instant {
        self.deadline
    }
}

/// One-shot timers driven by a controlled clock.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    wakers: BTreeMap<TimerKey, Waker>,
    sequence: u64,
}

impl Timers {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.wakers.len()
    }

    pub fn register(&mut self, deadline: Instant, waker: Waker) -> TimerKey {
        self.sequence = self.sequence.wrapping_add(1);
        let key = TimerKey {
            deadline,
            sequence: self.sequence,
        };

        self.wakers.insert(key, waker);
        key
    }

    pub fn unregister(&mut self, key: TimerKey) {
        self.wakers.remove(&key);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.wakers.keys().next().map(|key| key.deadline)
    }

    /// Removes and wakes every timer whose deadline is at or before `now`.
    pub fn wake_due(&mut self, now: Instant) {
        while let Some(entry) = self.wakers.first_entry() {
            if entry.key().deadline > now {
                break;
            }

            entry.remove().wake();
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn same_deadline_yields_distinct_keys() {
        let mut timers = Timers::default();
        let when = Instant::now() + Duration::from_secs(2);

        let first = timers.register(when, Waker::noop().clone());
        let second = timers.register(when, Waker::noop().clone());

        assert_ne!(first, second);

        timers.wake_due(when);
        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn wake_due_respects_order() {
        let mut timers = Timers::default();
        let anchor = Instant::now();
        let first = anchor + Duration::from_secs(1);
        let second = anchor + Duration::from_secs(2);

        timers.register(second, Waker::noop().clone());
        timers.register(first, Waker::noop().clone());
        assert_eq!(timers.next_deadline(), Some(first));

        timers.wake_due(first);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(second));

        timers.wake_due(second);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn unregister_ok() {
        let mut timers = Timers::default();
        let now = Instant::now();
        let key = timers.register(now, Waker::noop().clone());
        assert_eq!(key.deadline(), now);

        timers.unregister(key);

        assert_eq!(timers.len(), 0);
    }
}
