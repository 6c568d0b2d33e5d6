use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use serpent_core::config::GenerationSettings;
use serpent_core::traits::Generator;
use serpent_core::{Error, Result};

/// Wraps a generator with a per-attempt timeout and bounded retries with
/// linear backoff. Only retryable errors are retried.
pub struct ResilientGenerator {
    inner: Arc<dyn Generator>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl ResilientGenerator {
    pub fn new(inner: Arc<dyn Generator>, settings: &GenerationSettings) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }
}

#[async_trait]
impl Generator for ResilientGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.inner.generate(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout { operation: "generation".into(), secs: self.timeout.as_secs() }),
            };
            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, max = self.max_retries, error = %e, "generation failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
