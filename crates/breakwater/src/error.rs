// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::breaker::CircuitState;

/// A circuit breaker refused to admit a call.
///
/// Returned when the breaker is open and still waiting, or when it is half-open and every
/// probe slot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is {state} and does not permit further calls")]
pub struct CallNotPermitted {
    name: String,
    state: CircuitState,
}

impl CallNotPermitted {
    pub(crate) fn new(name: impl Into<String>, state: CircuitState) -> Self {
        Self { name: name.into(), state }
    }

    /// The name of the breaker that refused the call.
    #[must_use]
    pub fn breaker_name(&self) -> &str {
        &self.name
    }

    /// The state of the breaker at the moment it refused the call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }
}

/// The error returned by [`Executor`][crate::Executor].
///
/// Each variant names the stage that failed, so callers can tell a denied call from an
/// exhausted retry loop and from a failing fallback.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecuteError<E> {
    /// The breaker refused the first attempt. The operation was never invoked.
    #[error(transparent)]
    CallNotPermitted(#[from] CallNotPermitted),

    /// The operation failed and no further attempt was made, either because the retry policy
    /// gave up or because the breaker refused a retry.
    #[error("operation failed after {attempts} attempt(s)")]
    OperationFailed {
        /// The error of the last attempt.
        #[source]
        source: E,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The fallback failed after the primary path failed.
    #[error("fallback failed")]
    FallbackFailed(#[source] E),

    /// The call was canceled before it completed.
    #[error("operation canceled")]
    Canceled,
}

impl<E> ExecuteError<E> {
    /// Whether the breaker refused the call.
    #[must_use]
    pub fn is_call_not_permitted(&self) -> bool {
        matches!(self, Self::CallNotPermitted(_))
    }

    /// Returns the error produced by the operation or the fallback, if any.
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::OperationFailed { source, .. } | Self::FallbackFailed(source) => Some(source),
            Self::CallNotPermitted(_) | Self::Canceled => None,
        }
    }
}

/// A configuration value is outside of its valid range.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The sliding window must hold at least one outcome.
    #[error("sliding window size must be at least 1")]
    ZeroWindowSize,

    /// At least one call must be buffered before the failure rate is evaluated.
    #[error("minimum number of calls must be at least 1")]
    ZeroMinimumCalls,

    /// A half-open breaker must admit at least one probe.
    #[error("permitted number of calls in half-open state must be at least 1")]
    ZeroHalfOpenCalls,

    /// A rate threshold is not within `(0, 100]`.
    #[error("{name} must be within (0, 100], got {value}")]
    ThresholdOutOfRange {
        /// The name of the offending setting.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// A retry policy must make at least one attempt.
    #[error("max attempts must be at least 1")]
    ZeroMaxAttempts,
}
