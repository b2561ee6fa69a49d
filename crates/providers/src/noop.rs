use crate::{ClassifyResponse, LlmProvider, ProviderError};

/// Stands in when no model is configured; every call reports unavailability.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl LlmProvider for NoopProvider {
    async fn classify(&self, _prompt: &str) -> Result<ClassifyResponse, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
