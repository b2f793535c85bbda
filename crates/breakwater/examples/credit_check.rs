// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Credit check example that guards a flaky scoring service with a circuit breaker and
//! retries, and falls back to a conservative decision once the service cannot be reached.
//!
//! Run with `cargo run --example credit_check --features logs` to see the breaker open,
//! probe the service and close again in the log output.

use std::thread;
use std::time::Duration;

use breakwater::breaker::BreakerConfig;
use breakwater::retry::{Backoff, RetryConfig, RetryPolicy};
use breakwater::{ExecuteError, Executor, Registry, ResilienceContext};
use breakwater_clock::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Deny,
}

#[derive(Debug, thiserror::Error)]
#[error("scoring service unavailable for applicant {0}")]
struct ScoringUnavailable(u32);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let context = ResilienceContext::new(Clock::new_system()).name("credit").enable_logs();
    let registry = Registry::new(&context);

    // Lower these values to see the breaker trip sooner
    let breaker = registry.get_or_create(
        "scoring",
        BreakerConfig::default()
            .with_sliding_window_size(10)
            .with_minimum_number_of_calls(5)
            .with_failure_rate_threshold(50.0)
            .with_wait_duration_in_open_state(Duration::from_millis(300))
            .with_permitted_number_of_calls_in_half_open_state(2)
            .with_automatic_transition(true),
    )?;
    let retry = RetryPolicy::new(
        RetryConfig::default()
            .with_max_attempts(2)
            .with_backoff(Backoff::Exponential)
            .with_base_delay(Duration::from_millis(10))
            .with_jitter(true),
        &context,
    )?;
    let executor = Executor::new(breaker, retry);

    for applicant in 0..60 {
        thread::sleep(Duration::from_millis(25));

        let decision = executor.execute_with_fallback(
            |_attempt| score(applicant),
            |error: ExecuteError<ScoringUnavailable>| {
                if error.is_call_not_permitted() {
                    println!("{applicant}: scoring skipped, circuit is open");
                }
                Ok(Decision::Deny)
            },
        )?;

        println!("{applicant}: {decision:?} ({:?})", executor.breaker().state());
    }

    let metrics = executor.breaker().metrics();
    println!(
        "buffered: {}, failed: {}, rejected: {}",
        metrics.buffered_calls(),
        metrics.failed_calls(),
        metrics.not_permitted_calls()
    );

    Ok(())
}

// The service fails most calls for the first applicants, then recovers
fn score(applicant: u32) -> Result<Decision, ScoringUnavailable> {
    if applicant < 30 && fastrand::u8(0..10) < 7 {
        return Err(ScoringUnavailable(applicant));
    }

    if applicant % 3 == 0 {
        Ok(Decision::Deny)
    } else {
        Ok(Decision::Approve)
    }
}
