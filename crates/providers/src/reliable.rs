//! Retrying provider: per-call timeout plus bounded exponential backoff.
//!
//! Wraps any provider. Transient failures (timeouts, rate limits, network
//! errors, 5xx) are retried; everything else is returned immediately.

use async_trait::async_trait;
use planloop_config::OracleConfig;
use planloop_core::error::ProviderError;
use planloop_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RetryingProvider {
    inner: Arc<dyn planloop_core::Provider>,
    timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryingProvider {
    pub fn new(
        inner: Arc<dyn planloop_core::Provider>,
        timeout: Duration,
        max_attempts: u32,
        backoff_base: Duration,
    ) -> Self {
        Self {
            inner,
            timeout,
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn from_config(inner: Arc<dyn planloop_core::Provider>, config: &OracleConfig) -> Self {
        Self::new(
            inner,
            Duration::from_secs(config.timeout_secs),
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    /// Delay before attempt `attempt + 1` (0-based): base, 2×base, 4×base…
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

#[async_trait]
impl planloop_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("no attempts made".into());

        for attempt in 0..self.max_attempts {
            match tokio::time::timeout(self.timeout, self.inner.complete(request.clone())).await {
                Ok(Ok(response)) => {
                    if attempt > 0 {
                        info!(provider = %self.inner.name(), attempt = attempt + 1, "Oracle call recovered");
                    }
                    return Ok(response);
                }
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Oracle call failed"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        timeout_secs = self.timeout.as_secs(),
                        "Oracle call timed out"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        self.inner.name(),
                        self.timeout.as_secs()
                    ));
                }
            }

            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(last_error)
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.health_check()).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }
}
