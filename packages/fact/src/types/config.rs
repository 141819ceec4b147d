//! Configuration types for the pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Retry budget for oracle and retrieval calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per unit, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each retry
    pub base_delay: Duration,

    /// Ceiling for the backoff delay
    pub max_delay: Duration,

    /// Budget for a single call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }
}

/// Extractor settings.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Tasks processed concurrently
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExtractConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Concurrent retrievals
    pub workers: usize,

    /// Pause a worker takes after each source
    pub delay: Duration,

    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            delay: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Validator settings.
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Pairs judged concurrently
    pub workers: usize,

    /// Evidence is cut to this many characters before judging
    pub max_evidence_chars: usize,

    pub retry: RetryPolicy,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_evidence_chars: 40_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ValidateConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_evidence_chars(mut self, chars: usize) -> Self {
        self.max_evidence_chars = chars;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How `unverifiable` pairs enter citation accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnverifiablePolicy {
    /// Left out of both numerator and denominator
    #[default]
    Exclude,
    /// Counted as unsupported
    CountAsUnsupported,
}

impl fmt::Display for UnverifiablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude => f.write_str("exclude"),
            Self::CountAsUnsupported => f.write_str("count-as-unsupported"),
        }
    }
}

impl FromStr for UnverifiablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclude" => Ok(Self::Exclude),
            "count-as-unsupported" => Ok(Self::CountAsUnsupported),
            other => Err(format!("unknown unverifiable policy: {}", other)),
        }
    }
}

/// Aggregator settings.
#[derive(Debug, Clone, Default)]
pub struct AggregateConfig {
    pub unverifiable_policy: UnverifiablePolicy,
}

impl AggregateConfig {
    pub fn with_unverifiable_policy(mut self, policy: UnverifiablePolicy) -> Self {
        self.unverifiable_policy = policy;
        self
    }
}
