//! # Backoff Calculator
//!
//! Retry delay policy for failed platform tasks.
//!
//! ## Overview
//!
//! Unified handling of server-requested backoff (Retry-After hints
//! carried on platform API errors) and exponential backoff with optional
//! jitter. Server hints win when present; both paths are capped by the
//! configured maximum delay.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BackoffSettings;
use crate::error::CrosspostError;

/// Result of a backoff calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffResult {
    /// Calculated delay in seconds.
    pub delay_seconds: u32,
    /// Which policy produced the delay.
    pub backoff_type: BackoffType,
    /// When the task becomes eligible to retry.
    pub next_retry_at: DateTime<Utc>,
}

/// Type of backoff applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffType {
    /// Server requested via a Retry-After hint.
    ServerRequested,
    /// Exponential backoff with optional jitter.
    Exponential,
}

/// Computes retry delays from the configured policy.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    settings: BackoffSettings,
}

impl BackoffCalculator {
    pub fn new(settings: BackoffSettings) -> Self {
        Self { settings }
    }

    pub fn with_defaults() -> Self {
        Self::new(BackoffSettings::default())
    }

    /// Delay before retry number `retry_count` (1-based) of a failed
    /// task. A Retry-After hint on the error overrides the exponential
    /// schedule; both are capped at the configured maximum.
    pub fn delay_for(&self, retry_count: u32, error: &CrosspostError) -> BackoffResult {
        if let Some(hint) = error.retry_after_hint() {
            let capped = u64::from(self.settings.max_delay_seconds).min(hint) as u32;
            return self.result(capped, BackoffType::ServerRequested);
        }

        let exponent = retry_count.saturating_sub(1).min(30);
        let exponential = f64::from(self.settings.base_delay_seconds)
            * self.settings.multiplier.powi(exponent as i32);
        let mut delay_seconds = exponential.min(f64::from(self.settings.max_delay_seconds)) as u32;

        if self.settings.jitter_enabled {
            delay_seconds = self.apply_jitter(delay_seconds);
        }

        self.result(delay_seconds, BackoffType::Exponential)
    }

    fn result(&self, delay_seconds: u32, backoff_type: BackoffType) -> BackoffResult {
        BackoffResult {
            delay_seconds,
            backoff_type,
            next_retry_at: Utc::now() + Duration::seconds(i64::from(delay_seconds)),
        }
    }

    /// Randomize the delay within `±max_jitter` to avoid retry herds.
    fn apply_jitter(&self, delay_seconds: u32) -> u32 {
        use rand::Rng;

        let jitter_range = (f64::from(delay_seconds) * self.settings.max_jitter) as u32;
        if jitter_range == 0 {
            return delay_seconds;
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0..=jitter_range);
        if rng.gen_bool(0.5) {
            delay_seconds.saturating_add(jitter)
        } else {
            delay_seconds.saturating_sub(jitter)
        }
    }
}

/// Parse a raw Retry-After value: integer seconds or an HTTP (RFC 2822)
/// date. Adapters use this when turning platform responses into errors.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        let diff = date.signed_duration_since(Utc::now());
        if diff.num_seconds() > 0 {
            return Some(diff.num_seconds() as u64);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn no_jitter() -> BackoffCalculator {
        BackoffCalculator::new(BackoffSettings {
            jitter_enabled: false,
            ..BackoffSettings::default()
        })
    }

    fn retryable_error() -> CrosspostError {
        CrosspostError::timeout("publish", 300)
    }

    #[test]
    fn test_exponential_schedule_doubles_per_retry() {
        let calculator = no_jitter();
        let delays: Vec<u32> = (1..=5)
            .map(|n| calculator.delay_for(n, &retryable_error()).delay_seconds)
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let calculator = no_jitter();
        let result = calculator.delay_for(20, &retryable_error());
        assert_eq!(result.delay_seconds, 300);
        assert_eq!(result.backoff_type, BackoffType::Exponential);
    }

    #[test]
    fn test_server_hint_overrides_schedule() {
        let calculator = no_jitter();
        let error = CrosspostError::platform_api("twitter", "rate limited", true, Some(42));
        let result = calculator.delay_for(1, &error);
        assert_eq!(result.delay_seconds, 42);
        assert_eq!(result.backoff_type, BackoffType::ServerRequested);
    }

    #[test]
    fn test_server_hint_is_capped() {
        let calculator = no_jitter();
        let error = CrosspostError::platform_api("twitter", "rate limited", true, Some(9000));
        let result = calculator.delay_for(1, &error);
        assert_eq!(result.delay_seconds, 300);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let calculator = BackoffCalculator::with_defaults();
        for retry in 1..=8 {
            let result = calculator.delay_for(retry, &retryable_error());
            let nominal = f64::from(
                BackoffSettings::default().base_delay_seconds,
            ) * 2f64.powi(retry as i32 - 1);
            let nominal = nominal.min(300.0);
            let spread = (nominal * 0.1).ceil() + 1.0;
            assert!(f64::from(result.delay_seconds) <= nominal + spread);
            assert!(f64::from(result.delay_seconds) >= (nominal - spread).max(0.0));
        }
    }

    proptest! {
        #[test]
        fn prop_exponential_delays_never_decrease(
            base in 1u32..=10,
            multiplier in 1.0f64..4.0,
            max in 30u32..=600,
        ) {
            let calculator = BackoffCalculator::new(BackoffSettings {
                base_delay_seconds: base,
                max_delay_seconds: max,
                multiplier,
                jitter_enabled: false,
                max_jitter: 0.0,
            });
            let error = CrosspostError::timeout("publish", 300);
            let mut previous = 0u32;
            for retry in 1..=40u32 {
                let delay = calculator.delay_for(retry, &error).delay_seconds;
                prop_assert!(delay >= previous);
                prop_assert!(delay <= max);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(120));
        assert_eq!(parse_retry_after(" 5 "), Some(5));
        assert_eq!(parse_retry_after("not-a-delay"), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let future = (Utc::now() + Duration::seconds(90)).to_rfc2822();
        let parsed = parse_retry_after(&future).unwrap();
        assert!(parsed > 80 && parsed <= 90);

        let past = (Utc::now() - Duration::seconds(90)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), None);
    }
}
