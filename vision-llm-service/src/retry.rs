//! Linear backoff for provider calls.
//!
//! Attempt `n` (1-based) that fails with a retryable error waits
//! `base_delay * n` before the next one. Non-retryable errors return
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error_handler::{Result, VisionCallError, env_opt_u32, env_opt_u64};

/// How many extra attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Reads `VISION_RETRIES` and `VISION_RETRY_BASE_MS`, falling back to
    /// the defaults.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            retries: env_opt_u32("VISION_RETRIES")?.unwrap_or(d.retries),
            base_delay: env_opt_u64("VISION_RETRY_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.base_delay),
        })
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. Returns the last error in the latter cases.
pub async fn with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> std::result::Result<T, VisionCallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, VisionCallError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt <= policy.retries => {
                let delay = policy.delay_after(attempt);
                warn!(
                    target_call = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::vision_provider::VisionProvider;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(code: u16) -> VisionCallError {
        VisionCallError::HttpStatus {
            provider: VisionProvider::OpenAI,
            status: StatusCode::from_u16(code).unwrap(),
            url: "http://mock".into(),
            snippet: String::new(),
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn delay_grows_linearly() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
        assert_eq!(p.delay_after(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_limit() {
        let calls = AtomicU32::new(0);
        let out: std::result::Result<(), _> = with_backoff(fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(503)) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let out: std::result::Result<(), _> = with_backoff(fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(400)) }
        })
        .await;
        assert_eq!(out.unwrap_err().status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let out = with_backoff(fast(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err(status(429)) } else { Ok(n) } }
        })
        .await;
        assert_eq!(out.unwrap(), 1);
    }
}
