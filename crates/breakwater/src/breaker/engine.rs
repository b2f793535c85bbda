// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use breakwater_clock::Clock;

use super::config::ValidatedSizes;
use super::constants::ERR_POISONED_LOCK;
use super::{BreakerConfig, BreakerMetrics, CircuitState};
use crate::{CallOutcome, SlidingWindow, WindowSnapshot};

/// Settings the engine evaluates on every call, extracted from a validated config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineOptions {
    pub sizes: ValidatedSizes,
    pub failure_rate_threshold: f32,
    pub slow_call_rate_threshold: f32,
    pub wait_duration: Duration,
    pub automatic_transition: bool,
}

impl EngineOptions {
    pub fn new(config: &BreakerConfig, sizes: ValidatedSizes) -> Self {
        Self {
            sizes,
            failure_rate_threshold: config.failure_rate_threshold,
            slow_call_rate_threshold: config.slow_call_rate_threshold,
            wait_duration: config.wait_duration_in_open_state,
            automatic_transition: config.automatic_transition_from_open_to_half_open_enabled,
        }
    }
}

/// Identifies an admitted call.
///
/// The epoch changes with every state transition; an outcome carrying an older epoch was
/// admitted under a previous state and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    epoch: u64,
    probe: bool,
}

impl Ticket {
    pub fn is_probe(self) -> bool {
        self.probe
    }
}

/// A state change performed by the engine, reported for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Closed to open; carries the window that tripped the breaker.
    Opened(WindowSnapshot),
    /// Open to half-open.
    HalfOpened,
    /// Half-open to open; carries the evaluated probe window.
    Reopened(WindowSnapshot),
    /// Half-open to closed; carries the evaluated probe window.
    Closed(WindowSnapshot),
    /// A manual transition or reset.
    Forced { from: CircuitState, to: CircuitState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnterResult {
    Accepted { ticket: Ticket, transition: Option<Transition> },
    Rejected { state: CircuitState },
}

/// The circuit breaker state machine.
///
/// Every read-modify-write happens under a single mutex; the current instant is read before
/// the lock is taken.
#[derive(Debug)]
pub(crate) struct EngineCore {
    state: Mutex<State>,
    options: EngineOptions,
    clock: Clock,
}

impl EngineCore {
    pub fn new(options: EngineOptions, clock: Clock) -> Self {
        let now = clock.instant();

        Self {
            state: Mutex::new(State {
                circuit: CircuitState::Closed,
                main: SlidingWindow::new(options.sizes.window_size),
                probes: SlidingWindow::new(options.sizes.half_open_calls),
                probes_issued: 0,
                opened_at: now,
                epoch: 0,
                not_permitted: 0,
            }),
            options,
            clock,
        }
    }

    pub fn enter(&self) -> EnterResult {
        let now = self.clock.instant();
        self.state.lock().expect(ERR_POISONED_LOCK).enter(now, &self.options)
    }

    /// Records an outcome. Without a ticket, the outcome is attributed to the current state.
    pub fn record(&self, ticket: Option<Ticket>, outcome: CallOutcome) -> Option<Transition> {
        let now = self.clock.instant();
        self.state.lock().expect(ERR_POISONED_LOCK).record(ticket, outcome, now, &self.options)
    }

    /// Returns the probe slot of a ticket that completes without an outcome.
    pub fn release(&self, ticket: Ticket) {
        self.state.lock().expect(ERR_POISONED_LOCK).release(ticket);
    }

    pub fn state(&self) -> (CircuitState, Option<Transition>) {
        let now = self.clock.instant();
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let transition = state.refresh(now, &self.options);

        (state.circuit, transition)
    }

    pub fn metrics(&self) -> (BreakerMetrics, Option<Transition>) {
        let now = self.clock.instant();
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let transition = state.refresh(now, &self.options);

        (state.metrics(&self.options), transition)
    }

    pub fn force(&self, target: CircuitState) -> Transition {
        let now = self.clock.instant();
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let from = state.circuit;

        match target {
            CircuitState::Closed => state.close(),
            CircuitState::Open => state.open(now),
            CircuitState::HalfOpen => state.half_open(),
        }

        Transition::Forced { from, to: target }
    }

    pub fn reset(&self) -> Transition {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let from = state.circuit;

        state.close();
        state.not_permitted = 0;

        Transition::Forced {
            from,
            to: CircuitState::Closed,
        }
    }
}

#[derive(Debug)]
struct State {
    circuit: CircuitState,
    main: SlidingWindow,
    probes: SlidingWindow,
    probes_issued: u32,
    opened_at: Instant,
    epoch: u64,
    not_permitted: u64,
}

impl State {
    fn enter(&mut self, now: Instant, options: &EngineOptions) -> EnterResult {
        match self.circuit {
            CircuitState::Closed => EnterResult::Accepted {
                ticket: self.ticket(false),
                transition: None,
            },
            CircuitState::Open => {
                let Some(transition) = self.refresh(now, options) else {
                    return self.reject();
                };

                self.probes_issued = 1;

                EnterResult::Accepted {
                    ticket: self.ticket(true),
                    transition: Some(transition),
                }
            }
            CircuitState::HalfOpen if self.probes_issued < options.sizes.half_open_calls.get() => {
                self.probes_issued = self.probes_issued.saturating_add(1);

                EnterResult::Accepted {
                    ticket: self.ticket(true),
                    transition: None,
                }
            }
            CircuitState::HalfOpen => self.reject(),
        }
    }

    fn record(&mut self, ticket: Option<Ticket>, outcome: CallOutcome, now: Instant, options: &EngineOptions) -> Option<Transition> {
        if ticket.is_some_and(|t| t.epoch != self.epoch) {
            return None;
        }

        match self.circuit {
            CircuitState::Closed => {
                self.main.insert(outcome);
                let snapshot = self.main.snapshot();

                if snapshot.total() < options.sizes.minimum_calls.get() || !self.is_unhealthy(snapshot, options) {
                    return None;
                }

                self.open(now);
                Some(Transition::Opened(snapshot))
            }
            // Outcomes arriving while open belong to calls admitted before the breaker opened.
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                self.probes.insert(outcome);
                let snapshot = self.probes.snapshot();

                if snapshot.total() < options.sizes.half_open_calls.get() {
                    return None;
                }

                if self.is_unhealthy(snapshot, options) {
                    self.open(now);
                    Some(Transition::Reopened(snapshot))
                } else {
                    self.close();
                    Some(Transition::Closed(snapshot))
                }
            }
        }
    }

    fn release(&mut self, ticket: Ticket) {
        if ticket.probe && ticket.epoch == self.epoch && self.circuit == CircuitState::HalfOpen {
            self.probes_issued = self.probes_issued.saturating_sub(1);
        }
    }

    /// Moves an open breaker to half-open once the wait elapsed and automatic transition is on.
    fn refresh(&mut self, now: Instant, options: &EngineOptions) -> Option<Transition> {
        let waited = now.saturating_duration_since(self.opened_at) >= options.wait_duration;

        if self.circuit == CircuitState::Open && options.automatic_transition && waited {
            self.half_open();
            return Some(Transition::HalfOpened);
        }

        None
    }

    fn is_unhealthy(&self, snapshot: WindowSnapshot, options: &EngineOptions) -> bool {
        snapshot.exceeds(options.failure_rate_threshold, options.slow_call_rate_threshold)
    }

    fn reject(&mut self) -> EnterResult {
        self.not_permitted = self.not_permitted.saturating_add(1);
        EnterResult::Rejected { state: self.circuit }
    }

    fn ticket(&self, probe: bool) -> Ticket {
        Ticket { epoch: self.epoch, probe }
    }

    fn open(&mut self, now: Instant) {
        self.circuit = CircuitState::Open;
        self.opened_at = now;
        self.main.clear();
        self.probes.clear();
        self.probes_issued = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn half_open(&mut self) {
        self.circuit = CircuitState::HalfOpen;
        self.probes.clear();
        self.probes_issued = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn close(&mut self) {
        self.circuit = CircuitState::Closed;
        self.main.clear();
        self.probes.clear();
        self.probes_issued = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn metrics(&self, options: &EngineOptions) -> BreakerMetrics {
        let (snapshot, required) = match self.circuit {
            CircuitState::HalfOpen => (self.probes.snapshot(), options.sizes.half_open_calls.get()),
            CircuitState::Closed | CircuitState::Open => (self.main.snapshot(), options.sizes.minimum_calls.get()),
        };

        BreakerMetrics::new(self.circuit, snapshot, required, self.not_permitted)
    }
}
