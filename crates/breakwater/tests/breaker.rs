// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "This is a test module")]
#![allow(
    clippy::arithmetic_side_effects,
    clippy::unchecked_time_subtraction,
    reason = "allow these lints in tests to improve the readability of the tests"
)]

//! Integration tests for the circuit breaker using only public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use breakwater::ResilienceContext;
use breakwater::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use breakwater_clock::{Clock, ClockControl};

const WAIT: Duration = Duration::from_secs(5);

fn config() -> BreakerConfig {
    BreakerConfig::default()
        .with_sliding_window_size(5)
        .with_minimum_number_of_calls(3)
        .with_failure_rate_threshold(50.0)
        .with_wait_duration_in_open_state(WAIT)
        .with_permitted_number_of_calls_in_half_open_state(3)
        .with_automatic_transition(true)
}

fn breaker(clock: &Clock, config: BreakerConfig) -> CircuitBreaker {
    CircuitBreaker::new("integration", config, &ResilienceContext::new(clock)).unwrap()
}

fn call(breaker: &CircuitBreaker, succeeded: bool) {
    let permit = breaker.try_acquire().unwrap();
    permit.record(breaker.classify(succeeded, Duration::from_millis(1)));
}

fn trip(breaker: &CircuitBreaker) {
    call(breaker, false);
    call(breaker, false);
    call(breaker, true);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn opens_right_after_crossing_call() {
    let clock = Clock::new_frozen();
    let breaker = breaker(&clock, config());

    call(&breaker, false);
    assert_eq!(breaker.state(), CircuitState::Closed);
    call(&breaker, false);
    assert_eq!(breaker.state(), CircuitState::Closed);
    call(&breaker, true);

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn failure_rate_below_threshold_stays_closed() {
    let clock = Clock::new_frozen();
    let breaker = breaker(&clock, config());

    for succeeded in [true, false, true, true, false] {
        call(&breaker, succeeded);
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state(), CircuitState::Closed);
    assert_eq!(metrics.failure_rate(), Some(40.0));
}

#[test]
fn oldest_outcomes_are_evicted() {
    let clock = Clock::new_frozen();
    let breaker = breaker(&clock, config());

    for succeeded in [false, true, true, true, true, true] {
        call(&breaker, succeeded);
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.buffered_calls(), 5);
    assert_eq!(metrics.failed_calls(), 0);
}

#[test]
fn open_denies_until_wait_elapsed() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    trip(&breaker);

    for _ in 0..10 {
        control.advance(Duration::from_millis(400));
        let error = breaker.try_acquire().unwrap_err();
        assert_eq!(error.state(), CircuitState::Open);
    }

    assert_eq!(breaker.metrics().not_permitted_calls(), 10);
}

#[test]
fn wait_elapsed_moves_to_half_open_on_next_call() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    trip(&breaker);

    control.advance(WAIT);
    let permit = breaker.try_acquire().unwrap();

    assert!(permit.is_probe());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[test]
fn manual_transition_required_without_automatic_transition() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config().with_automatic_transition(false));
    trip(&breaker);

    control.advance(WAIT * 10);
    assert!(breaker.try_acquire().is_err());
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.transition_to_half_open_state();
    assert!(breaker.try_acquire().is_ok());
}

#[cfg(not(miri))]
#[test]
fn half_open_admits_exactly_permitted_concurrent_calls() {
    const THREADS: usize = 32;

    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    trip(&breaker);
    control.advance(WAIT);

    let barrier = Arc::new(Barrier::new(THREADS));
    let admitted = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let breaker = breaker.clone();
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);

            thread::spawn(move || {
                barrier.wait();
                // permits are held until every thread has tried
                let permit = breaker.try_acquire().ok();
                if permit.is_some() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
                barrier.wait();
                drop(permit);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.metrics().not_permitted_calls(), u64::try_from(THREADS).unwrap() - 3);
}

#[test]
fn concurrent_failures_trip_once_at_threshold() {
    const THREADS: usize = 16;

    let clock = Clock::new_frozen();
    let breaker = breaker(
        &clock,
        config().with_sliding_window_size(8).with_minimum_number_of_calls(8),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let breaker = breaker.clone();
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                let permit = breaker.try_acquire().unwrap();
                barrier.wait();
                permit.record(breaker.classify(false, Duration::from_millis(1)));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // outcomes recorded after the trip belong to the closed state and are discarded
    let metrics = breaker.metrics();
    assert_eq!(metrics.state(), CircuitState::Open);
    assert_eq!(metrics.buffered_calls(), 0);
    assert!(breaker.try_acquire().is_err());
}

#[test]
fn successful_probes_close_with_empty_windows() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    trip(&breaker);
    control.advance(WAIT);

    let permits: Vec<_> = (0..3).map(|_| breaker.try_acquire().unwrap()).collect();
    for permit in permits {
        permit.record(breaker.classify(true, Duration::from_millis(1)));
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state(), CircuitState::Closed);
    assert_eq!(metrics.buffered_calls(), 0);
    assert_eq!(metrics.failure_rate(), None);
}

#[test]
fn failing_probes_reopen_with_fresh_wait() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    trip(&breaker);
    control.advance(WAIT);

    let permits: Vec<_> = (0..3).map(|_| breaker.try_acquire().unwrap()).collect();
    control.advance(Duration::from_secs(2));
    for (index, permit) in permits.into_iter().enumerate() {
        permit.record(breaker.classify(index == 0, Duration::from_millis(1)));
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // the wait counts from the reopening, not from the first opening
    control.advance(WAIT - Duration::from_millis(1));
    assert!(breaker.try_acquire().is_err());
    control.advance(Duration::from_millis(1));
    assert!(breaker.try_acquire().is_ok());
}

#[test]
fn outcome_of_call_admitted_before_opening_is_discarded() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());
    let late = breaker.try_acquire().unwrap();
    trip(&breaker);
    control.advance(WAIT);
    let probe = breaker.try_acquire().unwrap();

    late.record(breaker.classify(false, Duration::from_millis(1)));

    assert_eq!(breaker.metrics().buffered_calls(), 0);
    drop(probe);
}

#[test]
fn slow_calls_open_the_breaker() {
    let clock = Clock::new_frozen();
    let breaker = breaker(
        &clock,
        config()
            .with_slow_call_rate_threshold(50.0)
            .with_slow_call_duration_threshold(Duration::from_millis(200)),
    );

    for duration in [300, 50, 250] {
        let permit = breaker.try_acquire().unwrap();
        permit.record(breaker.classify(true, Duration::from_millis(duration)));
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state(), CircuitState::Open);
    assert_eq!(metrics.not_permitted_calls(), 0);
}

#[test]
fn reset_clears_from_open_and_half_open() {
    let control = ClockControl::new();
    let breaker = breaker(&control.to_clock(), config());

    trip(&breaker);
    let _ = breaker.try_acquire();
    breaker.reset();
    let metrics = breaker.metrics();
    assert_eq!(metrics.state(), CircuitState::Closed);
    assert_eq!(metrics.buffered_calls(), 0);
    assert_eq!(metrics.not_permitted_calls(), 0);

    trip(&breaker);
    control.advance(WAIT);
    call(&breaker, false);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().buffered_calls(), 0);
}
