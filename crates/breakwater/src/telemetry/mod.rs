// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry attribute keys.
//!
//! With the `metrics` feature, every resilience event increments the `resilience.event`
//! counter. The data points carry the attributes below so that events of different
//! pipelines, strategies and breakers can be told apart. With the `logs` feature, the same
//! events are emitted as `tracing` events named `breakwater.<strategy>.<event>`.
//!
//! Names follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations).

mod helper;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;

pub(crate) use helper::TelemetryHelper;

/// Key used to annotate the name of a resilience pipeline.
///
/// Examples: `credit_check`, `payment_flow`.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key used to annotate the name of a resilience strategy instance.
///
/// For circuit breakers this is the breaker name; for retries it is `retry`.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
///
/// Examples: `retry`, `circuit_opened`, `fallback`.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the state of a circuit breaker after the event.
pub const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";

/// Key used to annotate the zero-based index of a retry attempt.
pub const ATTEMPT_INDEX: &str = "resilience.attempt.index";

/// Key used to annotate whether a retry attempt is the last permitted one.
pub const ATTEMPT_IS_LAST: &str = "resilience.attempt.is_last";
