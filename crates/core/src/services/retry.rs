use std::future::Future;
use std::time::Duration;

use crate::errors::CoreError;

/// Run an idempotent async operation up to `max_attempts` times, sleeping
/// `backoff` between attempts.
///
/// Only transient failures (network, rate-limit, upstream) are retried;
/// anything else propagates immediately. Mutations must not be wrapped in
/// this — they are surfaced to the user with a manual retry action instead.
pub async fn retryable<T, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    backoff: Duration,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    debug_assert!(max_attempts > 0);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                log::warn!(
                    "Attempt {attempt}/{max_attempts} failed ({e}), retrying in {backoff:?}"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
