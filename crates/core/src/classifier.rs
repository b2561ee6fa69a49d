use crate::error::{CandidateRejected, ClassifierError};
use crate::models::{format_leaf_path, parse_leaf_path, FileDescriptor, Method, RoutingCandidate};
use crate::templates::FolderTemplate;
use providers::ProviderRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What an external classifier claims about a file.
#[derive(Debug, Clone)]
pub struct ClassifierVerdict {
    pub leaf_path: Vec<String>,
    pub confidence: f32,
    pub rationale: Option<String>,
}

/// Contract for content classifiers. Implementations may be remote and are
/// allowed to fail; the adapter absorbs every failure.
#[async_trait::async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(
        &self,
        file: &FileDescriptor,
        template: &FolderTemplate,
    ) -> Result<ClassifierVerdict, ClassifierError>;
}

/// Classifier that asks a language model from the provider registry.
#[derive(Clone)]
pub struct LlmClassifier {
    registry: ProviderRegistry,
    provider: Option<String>,
    preview_bytes: usize,
}

impl LlmClassifier {
    pub fn new(registry: ProviderRegistry, provider: Option<String>, preview_bytes: usize) -> Self {
        Self {
            registry,
            provider,
            preview_bytes,
        }
    }

    fn prompt(&self, file: &FileDescriptor, template: &FolderTemplate) -> String {
        let folders = template
            .folder_paths()
            .iter()
            .map(|p| format!("- {}", format_leaf_path(p)))
            .collect::<Vec<_>>()
            .join("\n");
        let mut prompt = format!(
            "Folder tree of template {} ({}):\n{}\n\nFile name: {}\nSize: {} bytes\n",
            template.id, template.label, folders, file.name, file.size
        );
        if let Some(preview) = text_preview(file.content.as_deref(), self.preview_bytes) {
            prompt.push_str("Content preview:\n");
            prompt.push_str(&preview);
            prompt.push('\n');
        }
        prompt
    }
}

/// Leading bytes as text, or `None` for empty or binary content.
fn text_preview(content: Option<&[u8]>, limit: usize) -> Option<String> {
    let bytes = content?;
    let head = &bytes[..bytes.len().min(limit)];
    if head.is_empty() || head.contains(&0) {
        return None;
    }
    let text = String::from_utf8_lossy(head);
    let replaced = text.chars().filter(|c| *c == char::REPLACEMENT_CHARACTER).count();
    // Mostly undecodable means binary, not text with a cut multibyte char.
    if replaced * 10 > text.chars().count() {
        return None;
    }
    Some(text.into_owned())
}

#[async_trait::async_trait]
impl ContentClassifier for LlmClassifier {
    async fn classify(
        &self,
        file: &FileDescriptor,
        template: &FolderTemplate,
    ) -> Result<ClassifierVerdict, ClassifierError> {
        let llm = self.registry.llm(self.provider.as_deref())?;
        let resp = llm.classify(&self.prompt(file, template)).await?;
        Ok(ClassifierVerdict {
            leaf_path: parse_leaf_path(&resp.label),
            confidence: resp.confidence,
            rationale: resp.rationale,
        })
    }
}

/// Wraps a classifier with a timeout and validation. Never fails: every
/// problem turns into "no candidate".
#[derive(Clone)]
pub struct ClassifierAdapter {
    inner: Arc<dyn ContentClassifier>,
    timeout: Duration,
}

impl ClassifierAdapter {
    pub fn new(inner: Arc<dyn ContentClassifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn candidate(
        &self,
        file: &FileDescriptor,
        template: &FolderTemplate,
    ) -> Option<RoutingCandidate> {
        let verdict = match tokio::time::timeout(self.timeout, self.inner.classify(file, template))
            .await
            .unwrap_or(Err(ClassifierError::Timeout(self.timeout)))
            .and_then(check_confidence)
        {
            Ok(v) => v,
            Err(err) => {
                warn!(file = %file.name, template = %template.id, error = %err, "classifier gave no candidate");
                return None;
            }
        };

        if !template.contains(&verdict.leaf_path) {
            let rejected = CandidateRejected {
                method: Method::Ai,
                template_id: template.id.clone(),
                path: verdict.leaf_path,
            };
            warn!(file = %file.name, "{rejected}");
            return None;
        }

        debug!(
            file = %file.name,
            path = %format_leaf_path(&verdict.leaf_path),
            confidence = verdict.confidence,
            rationale = verdict.rationale.as_deref().unwrap_or(""),
            "classifier candidate"
        );
        Some(RoutingCandidate::new(
            verdict.leaf_path,
            verdict.confidence,
            Method::Ai,
        ))
    }
}

fn check_confidence(verdict: ClassifierVerdict) -> Result<ClassifierVerdict, ClassifierError> {
    if verdict.confidence.is_finite() && (0.0..=1.0).contains(&verdict.confidence) {
        Ok(verdict)
    } else {
        Err(ClassifierError::Malformed(format!(
            "confidence {} outside [0, 1]",
            verdict.confidence
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{TemplateResolver, TEMPLATE_BREVE};
    use providers::{ClassifyResponse, LlmProvider, ProviderError};
    use std::sync::Mutex;

    struct Scripted {
        label: &'static str,
        confidence: f32,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for Scripted {
        async fn classify(&self, prompt: &str) -> Result<ClassifyResponse, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(ClassifyResponse {
                label: self.label.to_string(),
                confidence: self.confidence,
                rationale: Some("looks like it".into()),
            })
        }
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl ContentClassifier for Stalled {
        async fn classify(
            &self,
            _file: &FileDescriptor,
            _template: &FolderTemplate,
        ) -> Result<ClassifierVerdict, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(ClassifierError::Unavailable("never".into()))
        }
    }

    fn adapter_for(provider: Arc<dyn LlmProvider>) -> ClassifierAdapter {
        let registry = ProviderRegistry::new()
            .with_llm("scripted", provider)
            .set_preferred_llm("scripted");
        ClassifierAdapter::new(
            Arc::new(LlmClassifier::new(registry, None, 64)),
            Duration::from_secs(5),
        )
    }

    fn breve() -> Arc<FolderTemplate> {
        TemplateResolver::builtin().resolve(TEMPLATE_BREVE).unwrap()
    }

    #[tokio::test]
    async fn valid_answer_becomes_ai_candidate() {
        let provider = Arc::new(Scripted {
            label: "Amministrativo / Preventivi",
            confidence: 0.7,
            prompts: Mutex::new(Vec::new()),
        });
        let adapter = adapter_for(provider.clone());
        let file = FileDescriptor::new("offerta rossi.txt", 0).with_content(b"Spett.le ditta".to_vec());
        let c = adapter.candidate(&file, &breve()).await.unwrap();
        assert_eq!(c.method, Method::Ai);
        assert_eq!(c.leaf_path, vec!["Amministrativo", "Preventivi"]);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("- Amministrativo/Preventivi"));
        assert!(prompts[0].contains("offerta rossi.txt"));
        assert!(prompts[0].contains("Spett.le ditta"));
    }

    #[tokio::test]
    async fn path_missing_from_template_is_discarded() {
        let adapter = adapter_for(Arc::new(Scripted {
            label: "Contratti",
            confidence: 0.9,
            prompts: Mutex::new(Vec::new()),
        }));
        let file = FileDescriptor::new("contratto.pdf", 10);
        assert!(adapter.candidate(&file, &breve()).await.is_none());
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_malformed() {
        let adapter = adapter_for(Arc::new(Scripted {
            label: "Foto",
            confidence: 7.0,
            prompts: Mutex::new(Vec::new()),
        }));
        assert!(adapter
            .candidate(&FileDescriptor::new("x.jpg", 1), &breve())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn missing_provider_means_no_candidate() {
        let adapter = ClassifierAdapter::new(
            Arc::new(LlmClassifier::new(ProviderRegistry::new(), None, 64)),
            Duration::from_secs(1),
        );
        assert!(adapter
            .candidate(&FileDescriptor::new("x.pdf", 1), &breve())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn timeout_means_no_candidate() {
        let adapter = ClassifierAdapter::new(Arc::new(Stalled), Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert!(adapter
            .candidate(&FileDescriptor::new("x.pdf", 1), &breve())
            .await
            .is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn preview_skips_binary() {
        assert_eq!(text_preview(Some(&b"hello world"[..]), 5).as_deref(), Some("hello"));
        assert!(text_preview(Some(&[0x25u8, 0x00, 0x01][..]), 10).is_none());
        assert!(text_preview(Some(&[0xffu8; 32][..]), 10).is_none());
        assert!(text_preview(None, 10).is_none());
    }
}
