// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use breakwater_clock::Clock;

use crate::telemetry::TelemetryHelper;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared configuration for every resilience component created from it.
///
/// The context carries the [`Clock`] that breakers and retry policies read time from, the
/// pipeline name reported in telemetry, and the telemetry switches. Breakers, retry policies
/// and registries take a `&ResilienceContext` on construction.
///
/// # Examples
///
/// ```
/// use breakwater::ResilienceContext;
/// use breakwater_clock::Clock;
///
/// let context = ResilienceContext::new(Clock::new_system()).name("credit_check");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ResilienceContext {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl ResilienceContext {
    /// Creates a context that uses the given clock and the pipeline name `default`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// Sets the pipeline name reported by every component created from this context.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports resilience events to the `resilience.event` counter of the given provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::telemetry::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Emits resilience events as `tracing` events.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// The clock shared by every component created from this context.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        #[cfg_attr(not(any(feature = "metrics", feature = "logs", test)), expect(unused_mut, reason = "no telemetry"))]
        let mut helper = TelemetryHelper::new(self.name.clone(), strategy_name);

        #[cfg(any(feature = "metrics", test))]
        {
            helper.event_reporter = self.meter.as_ref().map(crate::telemetry::metrics::create_resilience_event_counter);
        }

        #[cfg(any(feature = "logs", test))]
        {
            helper.logs_enabled = self.logs_enabled;
        }

        helper
    }
}
