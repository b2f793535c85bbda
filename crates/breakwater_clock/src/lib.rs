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

//! Time primitives for resilience code that needs to be tested deterministically.
//!
//! Resilience mechanisms such as circuit breakers and retries are driven by time: a breaker
//! stays open for a wait duration, a retry sleeps between attempts, and every call is timed
//! to decide whether it was slow. Reading time straight from [`std::time`] makes that logic
//! slow and flaky to test. This crate routes every time access through a [`Clock`] that is
//! backed by the operating system in production and by a [`ClockControl`] in tests.
//!
//! # Overview
//!
//! - [`Clock`]: retrieves the current [`Instant`](std::time::Instant) and
//!   [`SystemTime`](std::time::SystemTime), blocks with [`Clock::sleep`], and creates
//!   [`Delay`] futures with [`Clock::delay`].
//! - [`Stopwatch`]: measures elapsed time relative to a clock.
//! - [`Delay`]: a future that completes once the given duration has elapsed.
//! - `ClockControl`: controls the passage of time in tests (requires the `test-util` feature).
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use breakwater_clock::Clock;
//!
//! let clock = Clock::new_system();
//! let stopwatch = clock.stopwatch();
//!
//! clock.sleep(Duration::from_millis(1));
//!
//! assert!(stopwatch.elapsed() >= Duration::from_millis(1));
//! ```
//!
//! # Features
//!
//! - `test-util`: exposes `ClockControl` and [`Clock::new_frozen`]. Never enable it in
//!   production code.

mod clock;
#[cfg(any(feature = "test-util", test))]
mod clock_control;
mod delay;
mod state;
mod stopwatch;
#[cfg(any(feature = "test-util", test))]
mod timers;

pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub use clock_control::ClockControl;
pub use delay::Delay;
pub use stopwatch::Stopwatch;
