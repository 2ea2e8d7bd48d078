//! # Retry Resilience
//!
//! A cancellation-aware exponential-backoff retry combinator. Used by the
//! dispatch engine around reply and acknowledge, where transient transport
//! errors are expected and neither exhaustion nor cancellation is fatal.

use std::future::Future;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio_util::sync::CancellationToken;

use crate::constants::{BACKOFF_INITIAL_INTERVAL, BACKOFF_MAX_ELAPSED, BACKOFF_MAX_INTERVAL};

/// Outcome of a retry loop that did not succeed.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The policy's elapsed-time budget ran out; carries the last error.
    Exhausted(E),
    /// Cancellation was observed while waiting to retry; carries the last error.
    Cancelled(E),
}

/// The backoff policy applied to reply and acknowledge attempts.
///
/// 5 s initial interval, 10 s ceiling, 300 s total budget, default
/// multiplier and randomization.
pub fn reply_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: BACKOFF_INITIAL_INTERVAL,
        max_interval: BACKOFF_MAX_INTERVAL,
        max_elapsed_time: Some(BACKOFF_MAX_ELAPSED),
        ..ExponentialBackoff::default()
    }
}

/// Retry `operation` under `policy` until it succeeds, the policy is
/// exhausted, or `cancel` fires.
///
/// The operation is always attempted at least once, even when `cancel` has
/// already fired; cancellation is only observed while waiting between
/// attempts. `notify` runs after every failed attempt.
pub async fn retry_notify<T, E, Op, Fut, Notify>(
    mut policy: ExponentialBackoff,
    cancel: &CancellationToken,
    mut operation: Op,
    mut notify: Notify,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Notify: FnMut(&E),
{
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                notify(&error);
                let Some(delay) = policy.next_backoff() else {
                    return Err(RetryError::Exhausted(error));
                };
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled(error)),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
