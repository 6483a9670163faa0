//! Retry with exponential back-off and jitter for the Paystack client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors. Calls that move money are only retried when the request
//! provably never reached Paystack (connect failures).

use std::future::Future;
use std::time::Duration;

use crate::error::PaystackError;

/// Whether a failed call may be re-sent without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Idempotency {
    /// Reads, and writes keyed by our own reference.
    Safe,
    /// Writes that could be applied twice (refunds).
    Unsafe,
}

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Connect failures, always.
/// - Timeouts and HTTP 5xx, only for [`Idempotency::Safe`] calls.
///
/// **Not retriable:**
/// - [`PaystackError::Api`]: Paystack rejected the request; retrying won't fix it.
/// - [`PaystackError::Deserialize`]: malformed response.
/// - [`PaystackError::InvalidBaseUrl`]: configuration error.
pub(crate) fn is_retriable(err: &PaystackError, idempotency: Idempotency) -> bool {
    match err {
        PaystackError::Http(e) => {
            e.is_connect()
                || (idempotency == Idempotency::Safe
                    && (e.is_timeout() || e.status().is_some_and(|s| s.is_server_error())))
        }
        PaystackError::Api(_)
        | PaystackError::Deserialize { .. }
        | PaystackError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The delay before retry `n` is `backoff_base_ms × 2ⁿ⁻¹ ± 25 %`, capped at
/// 30 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    idempotency: Idempotency,
    mut operation: F,
) -> Result<T, PaystackError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaystackError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err, idempotency) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "Paystack transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn deserialize_err() -> PaystackError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        PaystackError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    async fn connect_error() -> PaystackError {
        let err = reqwest::Client::new()
            .get("http://0.0.0.0:1")
            .send()
            .await
            .unwrap_err();
        PaystackError::Http(err)
    }

    #[test]
    fn api_error_is_not_retriable() {
        assert!(!is_retriable(
            &PaystackError::Api("Invalid key".to_owned()),
            Idempotency::Safe
        ));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err(), Idempotency::Safe));
    }

    #[tokio::test]
    async fn connect_errors_are_retriable_even_for_unsafe_calls() {
        let err = connect_error().await;
        assert!(is_retriable(&err, Idempotency::Safe));
        assert!(is_retriable(&err, Idempotency::Unsafe));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, Idempotency::Safe, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, PaystackError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_api_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, Idempotency::Safe, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(PaystackError::Api("Transaction reference not found".to_owned()))
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "API errors must not be retried");
        assert!(matches!(result, Err(PaystackError::Api(_))));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, Idempotency::Safe, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err::<u32, _>(connect_error().await)
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99, "should succeed after retries");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, Idempotency::Unsafe, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(connect_error().await)
            }
        })
        .await;
        assert!(matches!(result, Err(PaystackError::Http(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 attempt + 2 retries");
    }
}
