//! Retry policy for generation calls.

use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^attempt`, capped at `max`, with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max, jitter } => {
                let scaled = base.as_secs_f64() * 2_f64.powi(attempt.min(30) as i32);
                let capped = Duration::from_secs_f64(scaled.min(max.as_secs_f64()));
                if !jitter {
                    return capped;
                }

                let half = capped.as_millis() as u64 / 2;
                let offset = fastrand::u64(0..=half * 2);
                Duration::from_millis((capped.as_millis() as u64 + offset).saturating_sub(half))
            }
        }
    }
}

/// When and how often a failed generation call is re-issued.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
