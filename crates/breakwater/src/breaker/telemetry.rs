// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::CircuitState;
use super::engine::Transition;
use crate::WindowSnapshot;
use crate::telemetry::TelemetryHelper;

pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
pub(crate) const CIRCUIT_HALF_OPENED_EVENT_NAME: &str = "circuit_half_opened";
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";

/// Reports breaker events through the counter and `tracing`, depending on what is enabled.
#[derive(Debug, Clone)]
pub(crate) struct BreakerTelemetry {
    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(dead_code, reason = "only read when telemetry is compiled in")
    )]
    helper: TelemetryHelper,
}

impl BreakerTelemetry {
    pub fn new(helper: TelemetryHelper) -> Self {
        Self { helper }
    }

    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "only read when telemetry is compiled in")
    )]
    pub fn rejected(&self, state: CircuitState) {
        #[cfg(any(feature = "metrics", test))]
        self.report(CIRCUIT_REJECTED_EVENT_NAME, state);

        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            tracing::event!(
                name: "breakwater.circuit_breaker.rejected",
                tracing::Level::WARN,
                pipeline.name = self.helper.pipeline_name.as_ref(),
                strategy.name = self.helper.strategy_name.as_ref(),
                circuit_breaker.state = state.as_str(),
            );
        }
    }

    pub fn transitioned(&self, transition: Transition) {
        match transition {
            Transition::Opened(snapshot) => self.opened(snapshot, false),
            Transition::Reopened(snapshot) => self.opened(snapshot, true),
            Transition::HalfOpened => self.state_changed(CircuitState::HalfOpen),
            Transition::Closed(_) => self.state_changed(CircuitState::Closed),
            Transition::Forced { to, .. } => self.state_changed(to),
        }
    }

    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, reason = "only read when logs are compiled in")
    )]
    fn opened(&self, snapshot: WindowSnapshot, reopened: bool) {
        #[cfg(any(feature = "metrics", test))]
        self.report(CIRCUIT_OPENED_EVENT_NAME, CircuitState::Open);

        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            tracing::event!(
                name: "breakwater.circuit_breaker.opened",
                tracing::Level::WARN,
                pipeline.name = self.helper.pipeline_name.as_ref(),
                strategy.name = self.helper.strategy_name.as_ref(),
                circuit_breaker.state = CircuitState::Open.as_str(),
                circuit_breaker.reopened = reopened,
                circuit_breaker.calls.total = snapshot.total(),
                circuit_breaker.failure_rate = snapshot.failure_rate().unwrap_or_default(),
                circuit_breaker.slow_call_rate = snapshot.slow_call_rate().unwrap_or_default(),
            );
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", feature = "logs", test)),
        expect(unused_variables, reason = "only read when telemetry is compiled in")
    )]
    fn state_changed(&self, state: CircuitState) {
        #[cfg(any(feature = "metrics", test))]
        self.report(
            match state {
                CircuitState::Open => CIRCUIT_OPENED_EVENT_NAME,
                CircuitState::HalfOpen => CIRCUIT_HALF_OPENED_EVENT_NAME,
                CircuitState::Closed => CIRCUIT_CLOSED_EVENT_NAME,
            },
            state,
        );

        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            let pipeline_name = self.helper.pipeline_name.as_ref();
            let strategy_name = self.helper.strategy_name.as_ref();

            match state {
                CircuitState::Open => tracing::event!(
                    name: "breakwater.circuit_breaker.opened",
                    tracing::Level::WARN,
                    pipeline.name = pipeline_name,
                    strategy.name = strategy_name,
                    circuit_breaker.state = state.as_str(),
                ),
                CircuitState::HalfOpen => tracing::event!(
                    name: "breakwater.circuit_breaker.half_open",
                    tracing::Level::INFO,
                    pipeline.name = pipeline_name,
                    strategy.name = strategy_name,
                    circuit_breaker.state = state.as_str(),
                ),
                CircuitState::Closed => tracing::event!(
                    name: "breakwater.circuit_breaker.closed",
                    tracing::Level::INFO,
                    pipeline.name = pipeline_name,
                    strategy.name = strategy_name,
                    circuit_breaker.state = state.as_str(),
                ),
            }
        }
    }

    #[cfg(any(feature = "metrics", test))]
    fn report(&self, event_name: &'static str, state: CircuitState) {
        self.helper
            .report_event(event_name, &[opentelemetry::KeyValue::new(crate::telemetry::CIRCUIT_STATE, state.as_str())]);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use breakwater_clock::Clock;
    use opentelemetry::KeyValue;

    use super::*;
    use crate::ResilienceContext;
    use crate::telemetry::{CIRCUIT_STATE, EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME};
    use crate::testing::{LogCapture, MetricTester};
    use crate::{CallOutcome, SlidingWindow};

    fn telemetry(context: &ResilienceContext) -> BreakerTelemetry {
        BreakerTelemetry::new(context.create_telemetry("inventory".into()))
    }

    fn tripped_snapshot() -> crate::WindowSnapshot {
        let mut window = SlidingWindow::new(std::num::NonZeroU32::new(3).unwrap());
        let now = Clock::new_frozen().instant();
        window.insert(CallOutcome::new(false, false, Duration::ZERO, now));
        window.insert(CallOutcome::new(false, true, Duration::ZERO, now));
        window.snapshot()
    }

    #[cfg(not(miri))]
    #[test]
    fn rejected_reports_metric() {
        let tester = MetricTester::new();
        let context = ResilienceContext::new(Clock::new_frozen())
            .name("orders")
            .enable_metrics(tester.meter_provider());

        telemetry(&context).rejected(CircuitState::HalfOpen);

        tester.assert_attributes_contain(&[
            KeyValue::new(PIPELINE_NAME, "orders"),
            KeyValue::new(STRATEGY_NAME, "inventory"),
            KeyValue::new(EVENT_NAME, CIRCUIT_REJECTED_EVENT_NAME),
            KeyValue::new(CIRCUIT_STATE, "half_open"),
        ]);
    }

    #[cfg(not(miri))]
    #[test]
    fn opened_reports_metric() {
        let tester = MetricTester::new();
        let context = ResilienceContext::new(Clock::new_frozen()).enable_metrics(tester.meter_provider());

        telemetry(&context).transitioned(Transition::Opened(tripped_snapshot()));

        tester.assert_attributes_contain(&[
            KeyValue::new(EVENT_NAME, CIRCUIT_OPENED_EVENT_NAME),
            KeyValue::new(CIRCUIT_STATE, "open"),
        ]);
    }

    #[cfg(not(miri))]
    #[test]
    fn forced_close_reports_metric() {
        let tester = MetricTester::new();
        let context = ResilienceContext::new(Clock::new_frozen()).enable_metrics(tester.meter_provider());

        telemetry(&context).transitioned(Transition::Forced {
            from: CircuitState::Open,
            to: CircuitState::Closed,
        });

        tester.assert_attributes_contain(&[
            KeyValue::new(EVENT_NAME, CIRCUIT_CLOSED_EVENT_NAME),
            KeyValue::new(CIRCUIT_STATE, "closed"),
        ]);
    }

    #[test]
    fn opened_emits_log() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(Clock::new_frozen()).name("orders").enable_logs();

        telemetry(&context).transitioned(Transition::Reopened(tripped_snapshot()));

        capture.assert_contains("breakwater::breaker");
        capture.assert_contains("WARN");
        capture.assert_contains("pipeline.name=\"orders\"");
        capture.assert_contains("strategy.name=\"inventory\"");
        capture.assert_contains("circuit_breaker.reopened=true");
        capture.assert_contains("circuit_breaker.failure_rate=100");
    }

    #[test]
    fn half_opened_emits_info_log() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(Clock::new_frozen()).enable_logs();

        telemetry(&context).transitioned(Transition::HalfOpened);

        capture.assert_contains("breakwater::breaker");
        capture.assert_contains("INFO");
        capture.assert_contains("circuit_breaker.state=\"half_open\"");
    }

    #[test]
    fn closed_emits_info_log() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(Clock::new_frozen()).enable_logs();

        telemetry(&context).transitioned(Transition::Closed(crate::WindowSnapshot::default()));

        capture.assert_contains("circuit_breaker.state=\"closed\"");
        capture.assert_contains("INFO");
    }

    #[test]
    fn rejected_emits_warn_log() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(Clock::new_frozen()).enable_logs();

        telemetry(&context).rejected(CircuitState::Open);

        capture.assert_contains("circuit_breaker.state=\"open\"");
        capture.assert_contains("WARN");
    }

    #[test]
    fn logs_disabled_emits_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = ResilienceContext::new(Clock::new_frozen());

        telemetry(&context).rejected(CircuitState::Open);

        assert!(capture.output().is_empty());
    }
}
