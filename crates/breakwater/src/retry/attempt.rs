// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// One attempt of a retried operation.
///
/// Attempts are numbered from zero. The operation receives the attempt so it can, for
/// example, log the index or behave differently on its last chance.
///
/// # Examples
///
/// ```
/// use breakwater::retry::Attempt;
///
/// let attempt = Attempt::new(2, true);
/// assert_eq!(attempt.index(), 2);
/// assert!(!attempt.is_first());
/// assert!(attempt.is_last());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Attempt {
    /// Creates an attempt with the given zero-based index.
    #[must_use]
    pub fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    /// The first attempt of an operation allowed `max_attempts` attempts in total.
    pub(crate) fn first(max_attempts: u32) -> Self {
        Self::new(0, max_attempts <= 1)
    }

    /// Whether this is attempt zero.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.index == 0
    }

    /// Whether no further attempt follows this one.
    #[must_use]
    pub fn is_last(self) -> bool {
        self.is_last
    }

    /// The zero-based attempt index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// How many attempts have been made once this one completes.
    #[must_use]
    pub fn count(self) -> u32 {
        self.index.saturating_add(1)
    }

    /// The next attempt, or `None` when `max_attempts` are used up.
    #[cfg_attr(test, mutants::skip)] // an infinite loop when mutated
    pub(crate) fn increment(self, max_attempts: u32) -> Option<Self> {
        let next = self.index.saturating_add(1);

        if next >= max_attempts {
            return None;
        }

        Some(Self::new(next, next == max_attempts.saturating_sub(1)))
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}
