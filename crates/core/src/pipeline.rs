//! Wires a [`Router`] from the application configuration.

use crate::arbiter::Router;
use crate::classifier::{ClassifierAdapter, LlmClassifier};
use crate::config::AppConfig;
use crate::learned::SqlitePatternStore;
use crate::projects::StaticProjectRegistry;
use crate::records::SqliteRecordLog;
use crate::rules::{load_rules_from_dir, RuleSet};
use anyhow::Context;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            chat_model: config.classifier.model.clone(),
        });
        reg = reg.with_llm("openai", Arc::new(provider));
    }

    reg.set_preferred_llm(&config.classifier.provider)
}

/// Built-in rules followed by any rule files from `rules.path`.
pub fn build_rules(config: &AppConfig) -> anyhow::Result<RuleSet> {
    let mut rules = RuleSet::builtin();
    if let Some(dir) = &config.rules.path {
        let extra = load_rules_from_dir(Path::new(dir))
            .with_context(|| format!("loading rules from {dir}"))?;
        info!(count = extra.len(), dir = %dir, "loaded custom rules");
        rules.extend(extra)?;
    }
    Ok(rules)
}

pub async fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let pool = storage::connect(&config.database.path)
        .await
        .with_context(|| format!("opening database {}", config.database.path))?;
    storage::migrate(&pool).await.context("running migrations")?;

    let registry = build_registry(config);
    if registry.llm(None).is_err() {
        warn!(
            provider = %config.classifier.provider,
            available = ?registry.names(),
            "classifier provider not available, content classification disabled"
        );
    }
    let classifier = ClassifierAdapter::new(
        Arc::new(LlmClassifier::new(
            registry,
            None,
            config.classifier.preview_bytes,
        )),
        Duration::from_millis(config.routing.classifier_timeout_ms),
    );

    Ok(Router::new(
        Arc::new(SqlitePatternStore::new(pool.clone())),
        Arc::new(SqliteRecordLog::new(pool)),
        classifier,
    )
    .with_rules(build_rules(config)?)
    .with_projects(Arc::new(StaticProjectRegistry::new(config.projects.clone())))
    .with_thresholds(config.routing.thresholds))
}
