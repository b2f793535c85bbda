// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

const SCOPE_NAME: &str = env!("CARGO_PKG_NAME");
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

const RESILIENCE_EVENT_COUNTER: &str = "resilience.event";

pub(crate) fn create_meter(provider: &dyn MeterProvider) -> Meter {
    let scope = InstrumentationScope::builder(SCOPE_NAME)
        .with_version(SCOPE_VERSION)
        .with_schema_url(SCHEMA_URL)
        .build();

    provider.meter_with_scope(scope)
}

/// One data point per breaker transition, rejection, retry or fallback.
pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(RESILIENCE_EVENT_COUNTER)
        .with_description("Number of circuit breaker, retry and fallback events.")
        .with_unit("{event}")
        .build()
}
