//! Retry loop: run an async fetch until success, cancellation, or the policy says stop.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::ChunkError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// `op` receives the 1-based attempt number. Before each retry `on_retry` is
/// called with the failed attempt, its error and the upcoming delay. The
/// backoff sleep ends early with `ChunkError::Cancelled` when `cancel` fires.
pub async fn retry_with_backoff<T, F, Fut, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    mut on_retry: R,
) -> Result<T, ChunkError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ChunkError>>,
    R: FnMut(u32, &ChunkError, Duration),
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(ChunkError::Cancelled);
        }
        let err = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.decide(attempt, err.is_retryable()) {
            RetryDecision::NoRetry => return Err(err),
            RetryDecision::RetryAfter(delay) => {
                on_retry(attempt, &err, delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ChunkError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
