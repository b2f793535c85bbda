// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Per-strategy telemetry state handed out by [`ResilienceContext`][crate::ResilienceContext].
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) pipeline_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "names are only kept when telemetry is compiled in")
    )]
    pub(crate) fn new(pipeline_name: Cow<'static, str>, strategy_name: Cow<'static, str>) -> Self {
        Self {
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            pipeline_name,
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            strategy_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// A helper for another strategy of the same pipeline, sharing the reporter.
    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, unused_mut, reason = "names are only kept when telemetry is compiled in")
    )]
    pub(crate) fn with_strategy(&self, strategy_name: &'static str) -> Self {
        let mut helper = self.clone();

        #[cfg(any(feature = "metrics", feature = "logs", test))]
        {
            helper.strategy_name = Cow::Borrowed(strategy_name);
        }

        helper
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    /// Increments the event counter with the pipeline and strategy attributes prepended.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn report_event(&self, event_name: &'static str, attributes: &[opentelemetry::KeyValue]) {
        use opentelemetry::KeyValue;

        use super::{EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME};

        if let Some(reporter) = &self.event_reporter {
            let mut all = Vec::with_capacity(attributes.len().saturating_add(3));
            all.push(KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()));
            all.push(KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()));
            all.push(KeyValue::new(EVENT_NAME, event_name));
            all.extend_from_slice(attributes);

            reporter.add(1, &all);
        }
    }
}
