// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

// The defaults follow resilience4j:
// <https://resilience4j.readme.io/docs/circuitbreaker#create-and-configure-a-circuitbreaker>

pub(crate) const DEFAULT_SLIDING_WINDOW_SIZE: u32 = 100;

pub(crate) const DEFAULT_MINIMUM_NUMBER_OF_CALLS: u32 = 100;

pub(crate) const DEFAULT_FAILURE_RATE_THRESHOLD: f32 = 50.0;

/// Slow calls only trip the breaker when every buffered call is slow.
pub(crate) const DEFAULT_SLOW_CALL_RATE_THRESHOLD: f32 = 100.0;

pub(crate) const DEFAULT_SLOW_CALL_DURATION_THRESHOLD: Duration = Duration::from_secs(60);

pub(crate) const DEFAULT_WAIT_DURATION_IN_OPEN_STATE: Duration = Duration::from_secs(60);

pub(crate) const DEFAULT_PERMITTED_CALLS_IN_HALF_OPEN_STATE: u32 = 10;

pub(crate) const DEFAULT_AUTOMATIC_TRANSITION: bool = false;

pub(crate) const ERR_POISONED_LOCK: &str = "poisoned lock - cannot continue execution because security and privacy guarantees can no longer be upheld";
