//! Mock provider implementation for testing.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the mock answers.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with this text.
    Respond(String),
    /// Echo the prompt back, prefixed with "Mock story: ".
    Echo,
    /// Fail every call.
    Fail,
    /// Sleep before answering.
    Slow(Duration),
}

/// Mock text provider for testing.
pub struct MockTextProvider {
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_params: Mutex<Option<GenerationParams>>,
}

impl MockTextProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_params: Mutex::new(None),
        }
    }

    pub fn responding(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Respond(text.into()))
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Fail)
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }

    pub fn last_params(&self) -> Option<GenerationParams> {
        self.last_params.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        if let Ok(mut last) = self.last_params.lock() {
            *last = Some(params.clone());
        }

        let text = match &self.behavior {
            MockBehavior::Respond(text) => text.clone(),
            MockBehavior::Echo => format!("Mock story: {}", prompt),
            MockBehavior::Fail => {
                return Err(ProviderError::ApiError("Mock provider failure".to_string()))
            }
            MockBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                "A story that took far too long.".to_string()
            }
        };

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text,
        })
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Fail => Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
