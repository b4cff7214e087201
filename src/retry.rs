//! Bounded retry with jittered exponential backoff
//!
//! Every retryable call in the system goes through [`retry_transient`]: the
//! mail client wraps each fetch/mutate operation, the classifier wraps the
//! whole prompt+call+parse round. Only errors reporting
//! [`TriageError::is_transient`] are retried; permanent errors propagate on
//! the first attempt, and the last error is re-raised once attempts are
//! exhausted.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

const INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Run `operation` up to `max_attempts` times, sleeping between attempts.
///
/// Delays grow exponentially from one second and are jittered by the backoff
/// policy, capped at thirty seconds.
pub async fn retry_transient<T, F, Fut>(
    operation_name: &str,
    max_attempts: u32,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_transient_with(operation_name, max_attempts, INITIAL_INTERVAL, operation).await
}

/// Same as [`retry_transient`] with a caller-chosen initial delay.
///
/// Exposed so tests can run with millisecond delays.
pub async fn retry_transient_with<T, F, Fut>(
    operation_name: &str,
    max_attempts: u32,
    initial_interval: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(initial_interval)
        .with_max_interval(MAX_INTERVAL)
        .with_max_elapsed_time(None)
        .build();

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempts < max_attempts => {
                let delay = policy.next_backoff().unwrap_or(MAX_INTERVAL);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
