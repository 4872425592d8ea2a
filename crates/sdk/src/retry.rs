//! Backoff for idempotent reads.
//!
//! Only `GET /aliases` and `GET /matches/{alias}` go through here. Enrollment,
//! identification and deletion are sent exactly once.

use std::{
    future::Future,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RetryPolicy,
    error::{Result, SdkError},
};

/// Builds the backon backoff schedule for a policy.
///
/// backon counts retries, not attempts: `max_attempts = 3` means the initial
/// call plus two retries.
fn backoff_for(policy: &RetryPolicy) -> ExponentialBuilder {
    let builder = ExponentialBuilder::default()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(policy.max_attempts.saturating_sub(1) as usize);
    if policy.jitter { builder.with_jitter() } else { builder }
}

/// Runs `operation` until it succeeds, fails for good, or the policy's
/// attempts run out.
///
/// Only errors with [`SdkError::is_retryable`] are tried again. When the last
/// of several attempts still fails that way the error is wrapped in
/// [`SdkError::RetryExhausted`]; a single-attempt policy returns it as is.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retries = AtomicU32::new(0);

    operation
        .retry(backoff_for(policy))
        .sleep(tokio::time::sleep)
        .when(SdkError::is_retryable)
        .notify(|err: &SdkError, dur: Duration| {
            let attempt = retries.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                attempt,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "Read failed, backing off"
            );
        })
        .await
        .map_err(|err| {
            let attempts = retries.load(Ordering::SeqCst) + 1;
            if err.is_retryable() && attempts > 1 {
                SdkError::RetryExhausted { attempts, source: Box::new(err) }
            } else {
                err
            }
        })
}

/// [`with_retry`] raced against `token`.
///
/// A token cancelled before the call, during an attempt or during a backoff
/// sleep yields [`SdkError::Cancelled`] and drops the pending attempt.
pub async fn with_retry_cancellable<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(SdkError::Cancelled);
    }

    tokio::select! {
        biased;
        () = token.cancelled() => Err(SdkError::Cancelled),
        result = with_retry(policy, operation) => result,
    }
}
