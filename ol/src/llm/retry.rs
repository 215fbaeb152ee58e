//! Exponential backoff for overloaded providers

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

/// Backoff schedule: `base * 2^attempt` plus up to 10% jitter, capped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter = base.mul_f64(rand::rng().random_range(0.0..0.1));
        base.saturating_add(jitter).min(self.max_delay)
    }
}

/// Wraps a client and retries [`LlmError::Overloaded`]; every other error
/// is returned immediately
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        debug!(?policy, "RetryingClient::new: called");
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!("RetryingClient::complete: called");
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Err(e) if e.is_overloaded() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Provider overloaded, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given error kind for the first `failures` calls
    struct FlakyClient {
        failures: usize,
        overloaded: bool,
        calls: AtomicUsize,
    }

    impl FlakyClient {
        fn new(failures: usize, overloaded: bool) -> Self {
            Self {
                failures,
                overloaded,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.overloaded {
                    return Err(LlmError::Overloaded("busy".to_string()));
                }
                return Err(LlmError::ApiError {
                    status: 400,
                    message: "bad".to_string(),
                });
            }
            Ok(CompletionResponse::text("ok"))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: String::new(),
            messages: vec![],
            max_tokens: 10,
            temperature: None,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        let first = policy.delay(0);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1100));

        let third = policy.delay(2);
        assert!(third >= Duration::from_secs(4) && third <= Duration::from_millis(4400));

        assert_eq!(policy.delay(10), Duration::from_secs(60));
        assert_eq!(policy.delay(40), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retries_overloaded_until_success() {
        let inner = Arc::new(FlakyClient::new(3, true));
        let client = RetryingClient::new(inner.clone(), fast_policy(10));

        let response = client.complete(request()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyClient::new(100, true));
        let client = RetryingClient::new(inner.clone(), fast_policy(3));

        let err = client.complete(request()).await.unwrap_err();
        assert!(err.is_overloaded());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let inner = Arc::new(FlakyClient::new(1, false));
        let client = RetryingClient::new(inner.clone(), fast_policy(10));

        let err = client.complete(request()).await.unwrap_err();
        assert!(!err.is_overloaded());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
