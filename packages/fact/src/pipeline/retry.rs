//! Retry with exponential backoff and per-call timeouts.
//!
//! Every oracle and retrieval call goes through [`with_retry`]. A call that
//! overruns `call_timeout` counts as a transient failure. Parse failures get
//! exactly one more attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{OracleError, RetrieveError, Retryability};
use crate::types::config::RetryPolicy;

/// Errors the retry helper knows how to classify.
pub trait RetryableError: Display {
    fn retryability(&self) -> Retryability;

    /// Error recorded when a call overruns its budget.
    fn timed_out(after: Duration) -> Self;
}

impl RetryableError for OracleError {
    fn retryability(&self) -> Retryability {
        OracleError::retryability(self)
    }

    fn timed_out(after: Duration) -> Self {
        OracleError::Timeout(after)
    }
}

impl RetryableError for RetrieveError {
    fn retryability(&self) -> Retryability {
        RetrieveError::retryability(self)
    }

    fn timed_out(after: Duration) -> Self {
        RetrieveError::Timeout(after)
    }
}

/// Final result of a retried call and how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// `op` receives the 1-based attempt number. `label` names the unit in logs.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> RetryOutcome<T, E>
where
    E: RetryableError,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut parse_failures = 0u32;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let error = match tokio::time::timeout(policy.call_timeout, op(attempt)).await {
            Ok(Ok(value)) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Ok(Err(e)) => e,
            Err(_) => E::timed_out(policy.call_timeout),
        };

        let retry = match error.retryability() {
            Retryability::Transient => true,
            Retryability::ParseFailure => {
                parse_failures += 1;
                parse_failures < 2
            }
            Retryability::Permanent => false,
        };

        if !retry || attempt >= max_attempts {
            warn!(
                unit = label,
                attempt,
                error = %error,
                "Giving up"
            );
            return RetryOutcome {
                result: Err(error),
                attempts: attempt,
            };
        }

        let delay = policy.backoff(attempt);
        debug!(
            unit = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after failure"
        );
        tokio::time::sleep(delay).await;
    }
}
