//! Transparent retries beneath the stages.
//!
//! Wraps any [`TextGenerator`] and repeats calls whose error is
//! [`RetryPolicy::Retryable`], with exponential back-off (or the provider's
//! `Retry-After` when it sent one). Stages see one call and one result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{GenerationError, GenerationRequest, RetryPolicy, TextGenerator};
use tracing::warn;

/// Upper bound on a single back-off delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct RetryingGenerator {
    inner: Arc<dyn TextGenerator>,
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff,
        }
    }

    fn backoff(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        let exponential = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        suggested.unwrap_or(exponential).min(MAX_BACKOFF)
    }
}

#[async_trait]
impl TextGenerator for RetryingGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            let err = match self.inner.generate(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            let RetryPolicy::Retryable { after } = err.retry_policy() else {
                return Err(err);
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            let delay = self.backoff(attempt, after);
            warn!(
                provider = self.inner.name(),
                stage = %request.stage,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "retrying generation"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
