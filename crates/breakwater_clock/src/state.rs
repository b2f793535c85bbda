// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Where a [`Clock`](crate::Clock) reads its time from.
#[derive(Debug, Clone)]
pub(crate) enum ClockState {
    System,
    #[cfg(any(feature = "test-util", test))]
    ClockControl(crate::ClockControl),
}

impl ClockState {
    pub(crate) fn is_controlled(&self) -> bool {
        match self {
            Self::System => false,
            #[cfg(any(feature = "test-util", test))]
            Self::ClockControl(_) => true,
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_state_send_and_sync() {
        static_assertions::assert_impl_all!(ClockState: Send, Sync);
    }

    #[test]
    fn is_controlled_ok() {
        assert!(!ClockState::System.is_controlled());
        assert!(ClockState::ClockControl(crate::ClockControl::new()).is_controlled());
    }
}
