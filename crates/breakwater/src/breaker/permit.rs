// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::CircuitBreaker;
use super::engine::Ticket;
use crate::CallOutcome;

/// Permission to perform one call through a [`CircuitBreaker`].
///
/// Report the result of the call with [`record`][Permit::record]. A permit dropped without
/// a recorded outcome returns its half-open probe slot to the breaker, so abandoned or
/// canceled calls never block the breaker from leaving the half-open state.
///
/// An outcome recorded after the breaker changed state since the permit was issued is
/// discarded.
#[derive(Debug)]
#[must_use = "dropping a permit without recording an outcome discards the call"]
pub struct Permit {
    breaker: CircuitBreaker,
    ticket: Option<Ticket>,
}

impl Permit {
    pub(super) fn new(breaker: CircuitBreaker, ticket: Ticket) -> Self {
        Self {
            breaker,
            ticket: Some(ticket),
        }
    }

    /// Whether the permit was issued as a half-open probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.ticket.is_some_and(Ticket::is_probe)
    }

    /// Records the outcome of the permitted call.
    pub fn record(mut self, outcome: CallOutcome) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.complete(Some(ticket), outcome);
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.release(ticket);
        }
    }
}
