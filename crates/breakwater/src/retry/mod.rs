// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded retries with backoff.
//!
//! A [`RetryPolicy`] re-runs a failing operation up to [`RetryConfig::max_attempts`] times
//! in total. Between attempts it waits for a delay computed by the configured [`Backoff`]:
//!
//! | Backoff | Delays with a 100 ms base |
//! |---|---|
//! | [`Constant`][Backoff::Constant] | 100 ms, 100 ms, 100 ms, ... |
//! | [`Linear`][Backoff::Linear] | 100 ms, 200 ms, 300 ms, ... |
//! | [`Exponential`][Backoff::Exponential] | 100 ms, 200 ms, 400 ms, ... |
//!
//! With jitter enabled every delay is spread uniformly over 75 % to 125 % of its nominal value,
//! and [`max_delay`][RetryConfig::max_delay] caps each delay after jitter.
//!
//! The policy is usable on its own through [`RetryPolicy::execute`] and
//! [`RetryPolicy::execute_async`]. Combined with a circuit breaker, use
//! [`Executor`][crate::Executor], which also asks the breaker for permission before every
//! retry.

mod attempt;
mod backoff;
mod config;
mod constants;
mod policy;

pub use attempt::Attempt;
pub use backoff::Backoff;
pub(crate) use backoff::Delays;
pub(crate) use policy::NextAttempt;
#[cfg(test)]
pub(crate) use policy::RETRY_EVENT_NAME;
pub use config::RetryConfig;
pub use policy::RetryPolicy;
