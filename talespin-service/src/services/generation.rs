//! Bounded, failure-absorbing access to the text provider.

use super::metrics;
use super::providers::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Model name reported when no provider is configured.
pub const LOCAL_MODEL: &str = "talespin-local";

/// Upper bound on a provider reachability check.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Wraps a [`TextProvider`] with a timeout. Every failure, including a missing
/// provider, is reported as `None` so callers fall back locally.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Option<Arc<dyn TextProvider>>,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(provider: Option<Arc<dyn TextProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// A client that never generates.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(20))
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> &str {
        self.provider
            .as_deref()
            .map(|p| p.model())
            .unwrap_or(LOCAL_MODEL)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the provider answers its health check. `None` when no
    /// provider is configured.
    pub async fn check_reachable(&self) -> Option<bool> {
        let provider = self.provider.as_ref()?;
        let limit = self.timeout.min(HEALTH_CHECK_TIMEOUT);

        let reachable = match tokio::time::timeout(limit, provider.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Text provider health check failed");
                false
            }
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Text provider health check timed out");
                false
            }
        };
        Some(reachable)
    }

    /// One attempt, no retries. `None` means "use the fallback".
    pub async fn generate(&self, prompt: &str, params: &GenerationParams) -> Option<String> {
        let started = Instant::now();
        let result = self.try_generate(prompt, params).await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                metrics::observe_generation("success", elapsed);
                tracing::info!(
                    latency_ms = elapsed.as_millis() as u64,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Generated story"
                );
                Some(response.text)
            }
            Err(ProviderError::NotConfigured(reason)) => {
                tracing::debug!(%reason, "Generation skipped");
                None
            }
            Err(e) => {
                let outcome = match e {
                    ProviderError::Timeout(_) => "timeout",
                    ProviderError::Truncated => "truncated",
                    _ => "error",
                };
                metrics::observe_generation(outcome, elapsed);
                tracing::warn!(
                    error = %e,
                    latency_ms = elapsed.as_millis() as u64,
                    "Generation failed, falling back"
                );
                None
            }
        }
    }

    /// Like [`generate`](Self::generate) but keeps the failure reason.
    pub async fn try_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured("No text provider configured".to_string())
        })?;

        let response = tokio::time::timeout(self.timeout, provider.generate(prompt, params))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        if response.text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response)
    }
}
