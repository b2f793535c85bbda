// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use crate::rnd::Rnd;

/// Width of the jitter range relative to the delay; 0.5 spreads delays over 75 % to 125 %.
const JITTER_FACTOR: f64 = 0.5;

const EXPONENTIAL_FACTOR: f64 = 2.0;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backoff {
    /// The same delay before every retry.
    ///
    /// **Example with `2s` base delay:** `2s, 2s, 2s, ...`
    Constant,

    /// The delay grows by the base delay with every retry.
    ///
    /// **Example with `2s` base delay:** `2s, 4s, 6s, ...`
    Linear,

    /// The delay doubles with every retry.
    ///
    /// **Example with `2s` base delay:** `2s, 4s, 8s, ...`
    Exponential,
}

/// Produces the delay before each retry; the first item is the delay after attempt zero.
#[derive(Debug, Clone)]
pub(crate) struct Delays {
    backoff: Backoff,
    base_delay: Duration,
    max_delay: Option<Duration>,
    use_jitter: bool,
    rnd: Rnd,
    attempt: u32,
}

impl Delays {
    pub fn new(backoff: Backoff, base_delay: Duration, max_delay: Option<Duration>, use_jitter: bool, rnd: Rnd) -> Self {
        Self {
            backoff,
            base_delay,
            max_delay,
            use_jitter,
            rnd,
            attempt: 0,
        }
    }
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.base_delay.is_zero() {
            return Some(Duration::ZERO);
        }

        let next_attempt = self.attempt.saturating_add(1);
        let delay = match self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(next_attempt),
            Backoff::Exponential => duration_mul_pow2(self.base_delay, self.attempt),
        };
        let delay = if self.use_jitter { apply_jitter(delay, &self.rnd) } else { delay };

        self.attempt = next_attempt;
        Some(clamp_to_max(delay, self.max_delay))
    }
}

fn clamp_to_max(delay: Duration, max: Option<Duration>) -> Duration {
    max.map_or(delay, |max| min(delay, max))
}

fn duration_mul_pow2(base: Duration, attempt: u32) -> Duration {
    let factor = EXPONENTIAL_FACTOR.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    secs_to_duration_saturating(base.as_secs_f64() * factor)
}

/// Spreads `delay` uniformly over `[0.75 * delay, 1.25 * delay]`.
fn apply_jitter(delay: Duration, rnd: &Rnd) -> Duration {
    let secs = delay.as_secs_f64();
    let offset = secs * JITTER_FACTOR / 2.0;

    secs_to_duration_saturating((secs * JITTER_FACTOR).mul_add(rnd.next_f64(), secs - offset))
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn delays(backoff: Backoff, base_ms: u64, max_ms: Option<u64>, rnd: Option<Rnd>) -> Vec<Duration> {
        Delays::new(
            backoff,
            Duration::from_millis(base_ms),
            max_ms.map(Duration::from_millis),
            rnd.is_some(),
            rnd.unwrap_or_default(),
        )
        .take(4)
        .collect()
    }

    fn millis(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[rstest]
    #[case::constant(Backoff::Constant, &[100, 100, 100, 100])]
    #[case::linear(Backoff::Linear, &[100, 200, 300, 400])]
    #[case::exponential(Backoff::Exponential, &[100, 200, 400, 800])]
    fn backoff_without_jitter(#[case] backoff: Backoff, #[case] expected: &[u64]) {
        assert_eq!(delays(backoff, 100, None, None), millis(expected));
    }

    #[test]
    fn max_delay_caps_growth() {
        assert_eq!(delays(Backoff::Exponential, 100, Some(300), None), millis(&[100, 200, 300, 300]));
    }

    #[test]
    fn zero_base_delay_is_always_zero() {
        assert_eq!(delays(Backoff::Exponential, 0, None, Some(Rnd::new_fixed(0.9))), millis(&[0, 0, 0, 0]));
    }

    #[rstest]
    #[case::lowest(0.0, 75)]
    #[case::middle(0.5, 100)]
    #[case::highest(1.0, 125)]
    fn jitter_bounds(#[case] random: f64, #[case] expected_ms: u64) {
        let delay = delays(Backoff::Constant, 100, None, Some(Rnd::new_fixed(random)))[0];

        let difference = delay.abs_diff(Duration::from_millis(expected_ms));
        assert!(difference < Duration::from_micros(1), "{delay:?} is not close to {expected_ms}ms");
    }

    #[test]
    fn jitter_applies_to_exponential_then_caps() {
        let result = delays(Backoff::Exponential, 100, Some(350), Some(Rnd::new_fixed(1.0)));

        assert!(result[0].abs_diff(Duration::from_millis(125)) < Duration::from_micros(1));
        assert!(result[1].abs_diff(Duration::from_millis(250)) < Duration::from_micros(1));
        assert_eq!(result[2], Duration::from_millis(350));
    }

    #[test]
    fn exponential_saturates() {
        let mut delays = Delays::new(Backoff::Exponential, Duration::from_secs(1), None, false, Rnd::default());

        assert_eq!(delays.nth(2000), Some(Duration::MAX));
    }

    #[test]
    fn secs_to_duration_saturating_ok() {
        assert_eq!(secs_to_duration_saturating(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration_saturating(f64::INFINITY), Duration::MAX);
        assert_eq!(secs_to_duration_saturating(1.5), Duration::from_millis(1500));
    }
}
