// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(
    test,
    allow(
        clippy::arithmetic_side_effects,
        clippy::unchecked_time_subtraction,
        reason = "allow these lints in tests to improve the readability of the tests"
    )
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process circuit breaking, retries and fallbacks for calls to unreliable dependencies.
//!
//! A failing remote dependency is expensive twice: every call waits for it, and every caller
//! keeps hammering it while it tries to recover. This crate limits both. A
//! [`CircuitBreaker`][breaker::CircuitBreaker] stops admitting calls once too many recent
//! calls failed or ran slowly, a [`RetryPolicy`][retry::RetryPolicy] re-runs transient
//! failures a bounded number of times, and an [`Executor`] combines both with an optional
//! fallback.
//!
//! # Overview
//!
//! - [`breaker`]: the count-based circuit breaker with its [`SlidingWindow`] of outcomes.
//! - [`retry`]: bounded retries with constant, linear or exponential backoff.
//! - [`Executor`]: runs an operation through a breaker and a retry policy, synchronously or
//!   asynchronously, with an optional fallback and cancellation.
//! - [`Registry`]: named breakers shared across an application.
//! - [`ResilienceContext`]: the clock, pipeline name and telemetry switches every component is
//!   created from.
//!
//! All time is read through [`breakwater_clock::Clock`], so tests can drive breakers and
//! retries with a controlled clock instead of waiting.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use breakwater::breaker::BreakerConfig;
//! use breakwater::retry::{RetryConfig, RetryPolicy};
//! use breakwater::{ExecuteError, Executor, Registry, ResilienceContext};
//! use breakwater_clock::Clock;
//!
//! let context = ResilienceContext::new(Clock::new_system()).name("checkout");
//! let registry = Registry::new(&context);
//!
//! let breaker = registry.get_or_create(
//!     "payments",
//!     BreakerConfig::default()
//!         .with_sliding_window_size(20)
//!         .with_minimum_number_of_calls(10),
//! )?;
//! let retry = RetryPolicy::new(RetryConfig::default().with_base_delay(Duration::from_millis(1)), &context)?;
//! let executor = Executor::new(breaker, retry);
//!
//! let charged = executor.execute_with_fallback(
//!     |_attempt| Ok::<_, std::io::Error>(true),
//!     |error: ExecuteError<std::io::Error>| Ok(!error.is_call_not_permitted()),
//! );
//!
//! assert!(charged?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `logs`: emits resilience events as [`tracing`](https://docs.rs/tracing) events once
//!   enabled with [`ResilienceContext::enable_logs`].
//! - `metrics`: reports resilience events to the OpenTelemetry `resilience.event` counter
//!   once enabled with [`ResilienceContext::enable_metrics`].
//! - `serde`: serialization of [`BreakerConfig`][breaker::BreakerConfig] and
//!   [`RetryConfig`][retry::RetryConfig].

pub mod breaker;
pub mod retry;
pub mod telemetry;

mod context;
mod error;
mod executor;
mod outcome;
mod registry;
mod rnd;
mod window;

pub use context::ResilienceContext;
pub use error::{CallNotPermitted, ConfigError, ExecuteError};
pub use executor::Executor;
pub use outcome::CallOutcome;
pub use registry::Registry;
pub use window::{SlidingWindow, WindowSnapshot};

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod testing;
