// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::Backoff;
use super::constants::*;
use crate::ConfigError;

/// Settings of a [`RetryPolicy`][super::RetryPolicy].
///
/// Defaults follow resilience4j: three attempts in total with a constant 500 ms delay and no
/// jitter.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use breakwater::retry::{Backoff, RetryConfig};
///
/// let config = RetryConfig::default()
///     .with_max_attempts(5)
///     .with_backoff(Backoff::Exponential)
///     .with_base_delay(Duration::from_millis(100))
///     .with_max_delay(Duration::from_secs(2))
///     .with_jitter(true);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// How the delay grows between attempts.
    pub backoff: Backoff,

    /// Delay before the first retry.
    #[cfg_attr(
        feature = "serde",
        serde(with = "jiff::fmt::serde::unsigned_duration::friendly::compact::required")
    )]
    pub base_delay: Duration,

    /// Upper bound of any single delay.
    #[cfg_attr(
        feature = "serde",
        serde(with = "jiff::fmt::serde::unsigned_duration::friendly::compact::optional")
    )]
    pub max_delay: Option<Duration>,

    /// Whether delays are spread randomly over 75 % to 125 % of their nominal value.
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: None,
            use_jitter: DEFAULT_USE_JITTER,
        }
    }
}

impl RetryConfig {
    /// Sets [`max_attempts`][Self::max_attempts].
    #[must_use]
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self { max_attempts, ..self }
    }

    /// Sets [`backoff`][Self::backoff].
    #[must_use]
    pub fn with_backoff(self, backoff: Backoff) -> Self {
        Self { backoff, ..self }
    }

    /// Sets [`base_delay`][Self::base_delay].
    #[must_use]
    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self { base_delay, ..self }
    }

    /// Sets [`max_delay`][Self::max_delay].
    #[must_use]
    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self {
            max_delay: Some(max_delay),
            ..self
        }
    }

    /// Sets [`use_jitter`][Self::use_jitter].
    #[must_use]
    pub fn with_jitter(self, use_jitter: bool) -> Self {
        Self { use_jitter, ..self }
    }

    /// Checks that every value is within its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroMaxAttempts`] when no attempt is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        Ok(())
    }
}
