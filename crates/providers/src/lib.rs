//! Provider abstractions for the language models behind the content classifier.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod noop;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Answer of a model asked to place a file: `label` is a `/`-separated
/// folder path, `confidence` is whatever the model reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub label: String,
    pub confidence: f32,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<ClassifyResponse, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.llms.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Parses the JSON object a chat model was asked to answer with. Models like
/// to wrap it in a fenced block, so anything outside the outermost braces is
/// ignored.
pub fn parse_classify_json(content: &str) -> Result<ClassifyResponse, ProviderError> {
    let start = content
        .find('{')
        .ok_or_else(|| ProviderError::MalformedResponse("no JSON object in reply".into()))?;
    let end = content
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ProviderError::MalformedResponse("unterminated JSON object".into()))?;
    serde_json::from_str(&content[start..=end])
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopProvider;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"label\": \"Amministrativo/Fatture\", \"confidence\": 0.8}\n```";
        let parsed = parse_classify_json(reply).unwrap();
        assert_eq!(parsed.label, "Amministrativo/Fatture");
        assert!((parsed.confidence - 0.8).abs() < f32::EPSILON);
        assert!(parsed.rationale.is_none());
    }

    #[test]
    fn rejects_prose_reply() {
        let err = parse_classify_json("I think it is an invoice").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn registry_resolves_preferred_llm() {
        let reg = ProviderRegistry::new()
            .with_llm("noop", Arc::new(NoopProvider))
            .set_preferred_llm("noop");
        assert!(reg.llm(None).is_ok());
        assert!(matches!(
            reg.llm(Some("openai")),
            Err(ProviderError::UnknownProvider(name)) if name == "openai"
        ));
        assert_eq!(reg.names(), vec!["noop".to_string()]);
    }
}
