//! Bounded retry with exponential backoff for durable-store operations
//! that fail transiently: 3 attempts at 100 ms, 300 ms, 900 ms,
//! capped at 1 s, applied only to [`StoreError::Transient`] failures —
//! permanent failures are returned immediately.

use std::time::Duration;

use lightq_store::StoreError;
use tracing::warn;

const DELAYS_MS: [u64; 3] = [100, 300, 900];
const CAP_MS: u64 = 1_000;

/// Runs `op`, retrying up to `DELAYS_MS.len()` additional times on
/// [`StoreError::Transient`]. `op_name` tags the retry/exhaustion metrics.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < DELAYS_MS.len() => {
                let delay_ms = DELAYS_MS[attempt].min(CAP_MS);
                warn!(op = op_name, attempt, delay_ms, error = %err, "durable store call failed, retrying");
                #[cfg(feature = "metrics")]
                lightq_store::metrics::record_retry(op_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    #[cfg(feature = "metrics")]
                    lightq_store::metrics::record_retry_exhausted(op_name);
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> StoreError {
        StoreError::Transient(Box::new(std::io::Error::other("down")))
    }

    fn permanent() -> StoreError {
        StoreError::Permanent(Box::new(std::io::Error::other("bad query")))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("insert", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = with_retry("insert", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(permanent()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), StoreError> = with_retry("insert", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1 + DELAYS_MS.len() as u32);
    }
}
