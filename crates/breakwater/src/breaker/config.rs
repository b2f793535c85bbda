// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZeroU32;
use std::time::Duration;

use super::constants::*;
use crate::ConfigError;

/// Settings of a [`CircuitBreaker`][super::CircuitBreaker].
///
/// Defaults follow resilience4j: a window of 100 calls, at least 100 buffered calls before
/// evaluation, a 50 % failure-rate threshold, a 100 % slow-call-rate threshold with a 60 s
/// slow-call duration, a 60 s wait in the open state, 10 probes in the half-open state, and no
/// automatic transition from open to half-open.
///
/// With the `serde` feature the configuration can be deserialized. Missing fields take their
/// default value and durations accept the friendly (`"5s"`, `"1m 30s"`) or ISO 8601
/// (`"PT5S"`) formats.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater::breaker::BreakerConfig;
///
/// let config = BreakerConfig::default()
///     .with_sliding_window_size(5)
///     .with_minimum_number_of_calls(3)
///     .with_wait_duration_in_open_state(Duration::from_secs(5))
///     .with_automatic_transition(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BreakerConfig {
    /// Number of most recent outcomes evaluated in the closed state.
    pub sliding_window_size: u32,

    /// Number of buffered outcomes required before the closed state evaluates its rates.
    ///
    /// Values above [`sliding_window_size`][Self::sliding_window_size] behave as if they
    /// were equal to it.
    pub minimum_number_of_calls: u32,

    /// Failure rate, in percent, at which the breaker opens.
    pub failure_rate_threshold: f32,

    /// Slow-call rate, in percent, at which the breaker opens.
    pub slow_call_rate_threshold: f32,

    /// Calls taking at least this long count as slow.
    #[cfg_attr(
        feature = "serde",
        serde(with = "jiff::fmt::serde::unsigned_duration::friendly::compact::required")
    )]
    pub slow_call_duration_threshold: Duration,

    /// How long the breaker stays open before probing.
    #[cfg_attr(
        feature = "serde",
        serde(with = "jiff::fmt::serde::unsigned_duration::friendly::compact::required")
    )]
    pub wait_duration_in_open_state: Duration,

    /// Number of probe calls admitted and evaluated in the half-open state.
    pub permitted_number_of_calls_in_half_open_state: u32,

    /// Whether the first call after the wait duration moves the breaker to half-open.
    ///
    /// When disabled, the breaker stays open until it is moved to half-open manually.
    pub automatic_transition_from_open_to_half_open_enabled: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: DEFAULT_SLIDING_WINDOW_SIZE,
            minimum_number_of_calls: DEFAULT_MINIMUM_NUMBER_OF_CALLS,
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            slow_call_rate_threshold: DEFAULT_SLOW_CALL_RATE_THRESHOLD,
            slow_call_duration_threshold: DEFAULT_SLOW_CALL_DURATION_THRESHOLD,
            wait_duration_in_open_state: DEFAULT_WAIT_DURATION_IN_OPEN_STATE,
            permitted_number_of_calls_in_half_open_state: DEFAULT_PERMITTED_CALLS_IN_HALF_OPEN_STATE,
            automatic_transition_from_open_to_half_open_enabled: DEFAULT_AUTOMATIC_TRANSITION,
        }
    }
}

impl BreakerConfig {
    /// Sets [`sliding_window_size`][Self::sliding_window_size].
    #[must_use]
    pub fn with_sliding_window_size(self, size: u32) -> Self {
        Self {
            sliding_window_size: size,
            ..self
        }
    }

    /// Sets [`minimum_number_of_calls`][Self::minimum_number_of_calls].
    #[must_use]
    pub fn with_minimum_number_of_calls(self, calls: u32) -> Self {
        Self {
            minimum_number_of_calls: calls,
            ..self
        }
    }

    /// Sets [`failure_rate_threshold`][Self::failure_rate_threshold].
    #[must_use]
    pub fn with_failure_rate_threshold(self, percent: f32) -> Self {
        Self {
            failure_rate_threshold: percent,
            ..self
        }
    }

    /// Sets [`slow_call_rate_threshold`][Self::slow_call_rate_threshold].
    #[must_use]
    pub fn with_slow_call_rate_threshold(self, percent: f32) -> Self {
        Self {
            slow_call_rate_threshold: percent,
            ..self
        }
    }

    /// Sets [`slow_call_duration_threshold`][Self::slow_call_duration_threshold].
    #[must_use]
    pub fn with_slow_call_duration_threshold(self, duration: Duration) -> Self {
        Self {
            slow_call_duration_threshold: duration,
            ..self
        }
    }

    /// Sets [`wait_duration_in_open_state`][Self::wait_duration_in_open_state].
    #[must_use]
    pub fn with_wait_duration_in_open_state(self, duration: Duration) -> Self {
        Self {
            wait_duration_in_open_state: duration,
            ..self
        }
    }

    /// Sets [`permitted_number_of_calls_in_half_open_state`][Self::permitted_number_of_calls_in_half_open_state].
    #[must_use]
    pub fn with_permitted_number_of_calls_in_half_open_state(self, calls: u32) -> Self {
        Self {
            permitted_number_of_calls_in_half_open_state: calls,
            ..self
        }
    }

    /// Sets [`automatic_transition_from_open_to_half_open_enabled`][Self::automatic_transition_from_open_to_half_open_enabled].
    #[must_use]
    pub fn with_automatic_transition(self, enabled: bool) -> Self {
        Self {
            automatic_transition_from_open_to_half_open_enabled: enabled,
            ..self
        }
    }

    /// Checks that every value is within its valid range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validated().map(|_| ())
    }

    pub(crate) fn validated(&self) -> Result<ValidatedSizes, ConfigError> {
        let window_size = NonZeroU32::new(self.sliding_window_size).ok_or(ConfigError::ZeroWindowSize)?;
        let minimum_calls = NonZeroU32::new(self.minimum_number_of_calls).ok_or(ConfigError::ZeroMinimumCalls)?;
        let half_open_calls =
            NonZeroU32::new(self.permitted_number_of_calls_in_half_open_state).ok_or(ConfigError::ZeroHalfOpenCalls)?;

        check_threshold("failure_rate_threshold", self.failure_rate_threshold)?;
        check_threshold("slow_call_rate_threshold", self.slow_call_rate_threshold)?;

        Ok(ValidatedSizes {
            window_size,
            minimum_calls: minimum_calls.min(window_size),
            half_open_calls,
        })
    }
}

/// Window sizes derived from a validated [`BreakerConfig`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValidatedSizes {
    pub window_size: NonZeroU32,
    pub minimum_calls: NonZeroU32,
    pub half_open_calls: NonZeroU32,
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
