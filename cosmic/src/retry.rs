//! Bounded retry for operations against an eventually-consistent control plane
//!
//! Freshly created entities are not always visible to the next command, and
//! deletes can fail while dependent entities are still being torn down.

use std::future::Future;
use std::time::Duration;
use tfplug::context::Context;

use crate::api::ApiError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(30),
        }
    }
}

/// Runs `op` until it succeeds or `policy.attempts` is exhausted.
/// Async job timeouts are returned immediately, as is the latest error once
/// `ctx` is cancelled.
pub async fn retry<T, F, Fut>(ctx: &Context, policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if err.is_async_timeout() || attempt >= attempts {
            return Err(err);
        }

        tracing::debug!(
            "Attempt {} of {} failed: {}; retrying in {:?}",
            attempt,
            attempts,
            err,
            policy.delay
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = ctx.cancelled() => return Err(err),
        }
        attempt += 1;
    }
}

pub fn is_entity_gone(err: &ApiError, id: &str) -> bool {
    err.is_entity_gone(id)
}

/// Treats "entity does not exist" for `id` as success
pub fn ignore_gone(result: Result<(), ApiError>, id: &str) -> Result<(), ApiError> {
    match result {
        Err(e) if is_entity_gone(&e, id) => {
            tracing::debug!("Entity {} is already gone", id);
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(5),
        }
    }

    fn gone(id: &str) -> ApiError {
        ApiError::ApiError {
            code: 431,
            cs_code: 4350,
            message: format!(
                "Invalid parameter id value={} due to incorrect long value format, \
                 or entity does not exist",
                id
            ),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry(&Context::new(), &fast(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ApiError::ServiceUnavailable)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = retry(&Context::new(), &fast(), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::ParseError(format!("attempt {}", n + 1)))
            }
        })
        .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to parse response: attempt 3"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn async_timeout_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = retry(&Context::new(), &fast(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::AsyncTimeout {
                    job_id: "j1".to_string(),
                    seconds: 900,
                })
            }
        })
        .await;

        assert!(result.unwrap_err().is_async_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_waiting() {
        let ctx = Context::new();
        ctx.cancel();
        let policy = RetryPolicy {
            attempts: 3,
            delay: Duration::from_secs(3600),
        };

        let result: Result<(), _> =
            retry(&ctx, &policy, || async { Err(ApiError::ServiceUnavailable) }).await;

        assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
    }

    #[test]
    fn ignore_gone_only_for_matching_id() {
        assert_ok!(ignore_gone(Err(gone("abc")), "abc"));
        assert_err!(ignore_gone(Err(gone("abc")), "xyz"));
        assert_ok!(ignore_gone(Ok(()), "abc"));
    }
}
