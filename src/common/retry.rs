// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry an async operation with exponential backoff.
pub async fn retry_async<F, Fut, T, E>(op: F, attempts: usize, initial_delay: Duration) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_async_when(op, attempts, initial_delay, |_| true).await
}

/// Like [`retry_async`], but stops early on errors `should_retry` rejects.
pub async fn retry_async_when<F, Fut, T, E, P>(
    mut op: F,
    attempts: usize,
    initial_delay: Duration,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts && should_retry(&e) => {
                sleep(backoff_delay(initial_delay, attempt, None)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`, optionally capped.
pub fn backoff_delay(initial: Duration, attempt: usize, cap: Option<Duration>) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    let delay = initial.saturating_mul(1u32 << shift);
    match cap {
        Some(max) => delay.min(max),
        None => delay,
    }
}
