//! Startup resource acquisition.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Acquires a startup resource, retrying with exponential backoff.
///
/// Each failed `connect` except the last runs `fallback` (for example,
/// provisioning a missing database) and then sleeps `2^attempt` seconds:
/// 2s after the first failure, 4s after the second, and so on. After
/// `max_attempts` failures the last error is returned. A `max_attempts` of
/// zero still makes one attempt.
///
/// Callers treat the error as fatal to startup.
///
/// # Example
///
/// ```rust
/// use portico_server::acquire_with_retry;
///
/// # tokio_test::block_on(async {
/// let value: Result<u32, String> = acquire_with_retry(
///     || async { Ok(7) },
///     || async {},
///     3,
/// )
/// .await;
/// assert_eq!(value, Ok(7));
/// # });
/// ```
pub async fn acquire_with_retry<T, E, C, CF, F, FF>(
    mut connect: C,
    mut fallback: F,
    max_attempts: u32,
) -> Result<T, E>
where
    C: FnMut() -> CF,
    CF: Future<Output = Result<T, E>>,
    F: FnMut() -> FF,
    FF: Future<Output = ()>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match connect().await {
            Ok(resource) => {
                if attempt > 1 {
                    tracing::info!(attempt, "resource acquired after retry");
                }
                return Ok(resource);
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(attempt, max_attempts, %error, "giving up acquiring resource");
                return Err(error);
            }
            Err(error) => {
                let backoff = Duration::from_secs(1u64 << attempt.min(16));
                tracing::warn!(
                    attempt,
                    max_attempts,
                    backoff_secs = backoff.as_secs(),
                    %error,
                    "resource unavailable, running fallback before retry"
                );
                fallback().await;
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
