//! Retryer (§4.9): per-invocation retry state, cloned once per call so its
//! attempt counter is never shared across concurrent invocations (§5).

use crate::error::Error;
use std::time::{Duration, SystemTime};

/// Builder-style configuration (§6): `{period, maxPeriod, maxAttempts}` or
/// "never".
#[derive(Debug, Clone)]
pub struct RetryerConfig {
    pub period_millis: u64,
    pub max_period_millis: u64,
    pub max_attempts: u32,
}

impl Default for RetryerConfig {
    fn default() -> Self {
        Self { period_millis: 100, max_period_millis: 5_000, max_attempts: 5 }
    }
}

/// State per clone: `attempt` (starts at 1), `period`, `maxPeriod`,
/// `maxAttempts`, `sleptForMillis` (§4.9). The `Never` variant always
/// re-throws, modeling the "never retry" configuration.
#[derive(Debug, Clone)]
pub enum Retryer {
    Standard {
        attempt: u32,
        period_millis: u64,
        max_period_millis: u64,
        max_attempts: u32,
        slept_for_millis: u64,
    },
    Never,
}

impl Retryer {
    #[must_use]
    pub const fn new(config: &RetryerConfig) -> Self {
        Self::Standard {
            attempt: 1,
            period_millis: config.period_millis,
            max_period_millis: config.max_period_millis,
            max_attempts: config.max_attempts,
            slept_for_millis: 0,
        }
    }

    #[must_use]
    pub const fn never() -> Self {
        Self::Never
    }

    #[must_use]
    pub const fn slept_for_millis(&self) -> u64 {
        match self {
            Self::Standard { slept_for_millis, .. } => *slept_for_millis,
            Self::Never => 0,
        }
    }

    /// The current attempt number (1-indexed), for a target strategy that
    /// varies its endpoint per retry attempt (§4.8).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        match self {
            Self::Standard { attempt, .. } => *attempt,
            Self::Never => 1,
        }
    }

    /// Called on a retryable failure. `retry_after` is the already-parsed
    /// `Retry-After` delay, if the response carried one. Returns the
    /// interval to sleep before the next attempt, or the original `error`
    /// if retries are exhausted (or this is the `Never` variant).
    pub fn retry(&mut self, error: Error, retry_after: Option<Duration>) -> Result<Duration, Error> {
        match self {
            Self::Never => Err(error),
            Self::Standard { attempt, period_millis, max_period_millis, max_attempts, slept_for_millis } => {
                *attempt += 1;
                if *attempt > *max_attempts {
                    return Err(error);
                }
                let max = Duration::from_millis(*max_period_millis);
                let interval = match retry_after {
                    Some(server_delay) => server_delay.min(max),
                    None => exponential_backoff(*period_millis, *attempt, *max_period_millis),
                };
                *slept_for_millis += u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
                Ok(interval)
            }
        }
    }
}

/// `period * 1.5^(attempt-1)`, clamped to `maxPeriod` (§4.9).
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn exponential_backoff(period_millis: u64, attempt: u32, max_period_millis: u64) -> Duration {
    let period = period_millis as f64;
    let factor = 1.5_f64.powi(i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX));
    let delay_ms = (period * factor).min(max_period_millis as f64);
    Duration::from_millis(delay_ms as u64)
}

/// Parses the `Retry-After` header (seconds or an HTTP-date) into a delay
/// duration from now. `None` if absent, malformed, or in the past.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(SystemTime::now()).ok()
}

/// Whether a status code should be converted to a retryable failure before
/// the error decoder even sees it (§6 load-balanced-client classification,
/// §7 retryable taxonomy): 408, 429, and 5xx except 501/505.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    match status {
        408 | 429 => true,
        500..=599 => !matches!(status, 501 | 505),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_matches_the_1_5_power_formula() {
        assert_eq!(exponential_backoff(100, 1, 10_000).as_millis(), 100);
        assert_eq!(exponential_backoff(100, 2, 10_000).as_millis(), 150);
        assert_eq!(exponential_backoff(100, 3, 10_000).as_millis(), 225);
    }

    #[test]
    fn exponential_backoff_clamps_to_max_period() {
        assert_eq!(exponential_backoff(100, 20, 1_000).as_millis(), 1_000);
    }

    #[test]
    fn retryer_attempt_starts_at_one_and_increments() {
        let config = RetryerConfig { period_millis: 10, max_period_millis: 1_000, max_attempts: 3 };
        let mut retryer = Retryer::new(&config);
        assert!(matches!(retryer, Retryer::Standard { attempt: 1, .. }));
        retryer.retry(Error::retryable("boom"), None).unwrap();
        assert!(matches!(retryer, Retryer::Standard { attempt: 2, .. }));
    }

    #[test]
    fn retryer_exhausts_after_max_attempts() {
        let config = RetryerConfig { period_millis: 1, max_period_millis: 10, max_attempts: 2 };
        let mut retryer = Retryer::new(&config);
        retryer.retry(Error::retryable("first"), None).unwrap();
        assert!(retryer.retry(Error::retryable("second"), None).is_err());
    }

    #[test]
    fn attempt_accessor_tracks_increments() {
        let config = RetryerConfig { period_millis: 1, max_period_millis: 10, max_attempts: 3 };
        let mut retryer = Retryer::new(&config);
        assert_eq!(retryer.attempt(), 1);
        retryer.retry(Error::retryable("boom"), None).unwrap();
        assert_eq!(retryer.attempt(), 2);
    }

    #[test]
    fn never_retryer_always_rethrows() {
        let mut retryer = Retryer::never();
        assert!(retryer.retry(Error::retryable("boom"), None).is_err());
    }

    #[test]
    fn retry_after_overrides_backoff_when_explicit() {
        let config = RetryerConfig { period_millis: 10, max_period_millis: 10_000, max_attempts: 5 };
        let mut retryer = Retryer::new(&config);
        let interval = retryer.retry(Error::retryable("boom"), Some(Duration::from_secs(3))).unwrap();
        assert_eq!(interval, Duration::from_secs(3));
    }

    #[test]
    fn retry_after_clamps_to_max_period() {
        let config = RetryerConfig { period_millis: 10, max_period_millis: 1_000, max_attempts: 5 };
        let mut retryer = Retryer::new(&config);
        let interval = retryer.retry(Error::retryable("boom"), Some(Duration::from_secs(60))).unwrap();
        assert_eq!(interval, Duration::from_millis(1_000));
    }

    #[test]
    fn parse_retry_after_handles_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after("not-a-number"), None);
    }

    #[test]
    fn status_408_and_429_are_retryable() {
        assert!(is_retryable_status(408));
        assert!(is_retryable_status(429));
    }

    #[test]
    fn status_501_and_505_are_excluded_from_5xx_retryable_range() {
        assert!(!is_retryable_status(501));
        assert!(!is_retryable_status(505));
        assert!(is_retryable_status(503));
    }
}
