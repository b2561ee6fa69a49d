//! Fuses learned, rule and classifier signals into one recorded suggestion.

use crate::classifier::ClassifierAdapter;
use crate::config::Thresholds;
use crate::error::{CandidateRejected, RoutingError};
use crate::learned::PatternStore;
use crate::models::{
    format_leaf_path, to_percent, FileDescriptor, LearnedPattern, Method, RoutingCandidate,
    RoutingRecord, RoutingResult,
};
use crate::projects::{ProjectRegistry, StaticProjectRegistry};
use crate::records::RecordLog;
use crate::rules::RuleSet;
use crate::signature::{self, ExtensionClass, Signature};
use crate::templates::{FolderTemplate, TemplateResolver};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Confidence given to the fallback folder when no signal produced anything.
pub const FALLBACK_CONFIDENCE: f32 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// The record already held this placement; nothing changed.
    Unchanged,
    /// Placement stored and fed back into the pattern store.
    Learned(LearnedPattern),
}

pub struct Router {
    templates: TemplateResolver,
    rules: RuleSet,
    patterns: Arc<dyn PatternStore>,
    records: Arc<dyn RecordLog>,
    classifier: ClassifierAdapter,
    projects: Arc<dyn ProjectRegistry>,
    thresholds: Thresholds,
    // Serializes check, confirm and record update of concurrent reports.
    reports: Mutex<()>,
}

impl Router {
    pub fn new(
        patterns: Arc<dyn PatternStore>,
        records: Arc<dyn RecordLog>,
        classifier: ClassifierAdapter,
    ) -> Self {
        Self {
            templates: TemplateResolver::builtin(),
            rules: RuleSet::builtin(),
            patterns,
            records,
            classifier,
            projects: Arc::new(StaticProjectRegistry::default()),
            thresholds: Thresholds::default(),
            reports: Mutex::new(()),
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_templates(mut self, templates: TemplateResolver) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_projects(mut self, projects: Arc<dyn ProjectRegistry>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Suggests a folder for `file` and records the decision.
    pub async fn route(
        &self,
        file: &FileDescriptor,
        template_id: &str,
        project_id: Option<&str>,
    ) -> Result<RoutingResult, RoutingError> {
        let template = self.templates.resolve(template_id)?;
        let signature = signature_of(file);
        let store_key = signature.store_key();

        let learned = self
            .patterns
            .lookup(&store_key)
            .await?
            .and_then(|p| admit(&template, p.candidate()));

        let chosen = match learned {
            Some(c) if c.percent() >= to_percent(self.thresholds.short_circuit) => {
                debug!(signature = %store_key, confidence = c.confidence, "learned pattern short-circuits");
                c
            }
            learned => {
                let mut candidates: Vec<RoutingCandidate> = learned.into_iter().collect();
                if let Some((rule, c)) = self.rules.first_match(&signature) {
                    debug!(rule = %rule.name, signature = %signature.key, "rule matched");
                    candidates.extend(admit(&template, c));
                }
                let accept = to_percent(self.thresholds.accept);
                if !candidates.iter().any(|c| c.percent() >= accept) {
                    candidates.extend(self.classifier.candidate(file, &template).await);
                }
                pick(candidates).unwrap_or_else(|| fallback(&template))
            }
        };

        // Only a fully computed result reaches the log.
        let record = RoutingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file.name.clone(),
            signature: store_key,
            template_id: template.id.clone(),
            project_id: project_id.map(str::to_string),
            suggested_path: chosen.leaf_path.clone(),
            actual_path: None,
            confidence: chosen.percent(),
            method: chosen.method,
            content_hash: file.content_hash(),
            created_at: Utc::now(),
            reported_at: None,
        };
        let confidence = record.confidence;
        let record_id = self.records.append(record).await?;

        info!(
            file = %file.name,
            template = %template.id,
            record = %record_id,
            path = %format_leaf_path(&chosen.leaf_path),
            method = %chosen.method,
            confidence,
            "routed file"
        );
        Ok(RoutingResult {
            record_id,
            leaf_path: chosen.leaf_path,
            confidence,
            method: chosen.method,
        })
    }

    /// Like [`Router::route`], with the template taken from the project registry.
    pub async fn route_for_project(
        &self,
        file: &FileDescriptor,
        project_id: &str,
    ) -> Result<RoutingResult, RoutingError> {
        let template_id = self
            .projects
            .template_for(project_id)
            .await
            .ok_or_else(|| RoutingError::UnknownProject(project_id.to_string()))?;
        self.route(file, &template_id, Some(project_id)).await
    }

    /// Feedback once a person accepted or overrode a suggestion.
    pub async fn report_actual(
        &self,
        record_id: &str,
        actual_path: &[String],
    ) -> Result<ReportOutcome, RoutingError> {
        let _guard = self.reports.lock().await;
        let record = self
            .records
            .get(record_id)
            .await?
            .ok_or_else(|| RoutingError::UnknownRecord(record_id.to_string()))?;
        let template = self.templates.resolve(&record.template_id)?;
        if !template.contains(actual_path) {
            return Err(RoutingError::InvalidPlacement {
                template_id: record.template_id,
                path: actual_path.to_vec(),
            });
        }
        if record.actual_path.as_deref() == Some(actual_path) {
            return Ok(ReportOutcome::Unchanged);
        }
        // Learn first: if this fails the record is untouched and a retry
        // of the same report is not mistaken for a repeat.
        let pattern = self.patterns.confirm(&record.signature, actual_path).await?;
        self.records
            .set_actual(record_id, actual_path, Utc::now())
            .await?;
        info!(
            record = %record_id,
            signature = %pattern.signature,
            path = %format_leaf_path(actual_path),
            times_confirmed = pattern.times_confirmed,
            "placement reported"
        );
        Ok(ReportOutcome::Learned(pattern))
    }

    pub async fn list_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<RoutingRecord>, RoutingError> {
        Ok(self.records.list_by_project(project_id).await?)
    }

    pub async fn learned_patterns(&self) -> Result<Vec<LearnedPattern>, RoutingError> {
        Ok(self.patterns.list().await?)
    }

    /// Administrative removal of a learned pattern.
    pub async fn forget(&self, signature: &str) -> Result<bool, RoutingError> {
        let removed = self.patterns.clear(signature).await?;
        if removed {
            info!(%signature, "learned pattern cleared");
        }
        Ok(removed)
    }
}

/// Signature of the file name; the class falls back to sniffing the content
/// when the name says nothing.
pub fn signature_of(file: &FileDescriptor) -> Signature {
    let mut sig = signature::normalize(&file.name);
    if sig.extension_class == ExtensionClass::Other {
        if let Some(bytes) = file.content.as_deref() {
            sig.extension_class = ExtensionClass::sniff(bytes);
        }
    }
    sig
}

fn admit(template: &FolderTemplate, candidate: RoutingCandidate) -> Option<RoutingCandidate> {
    if template.contains(&candidate.leaf_path) {
        return Some(candidate);
    }
    let rejected = CandidateRejected {
        method: candidate.method,
        template_id: template.id.clone(),
        path: candidate.leaf_path,
    };
    debug!("{rejected}");
    None
}

/// Highest persisted confidence wins; exact ties go to the more specific
/// signal (learned, then rule, then ai).
fn pick(candidates: Vec<RoutingCandidate>) -> Option<RoutingCandidate> {
    candidates
        .into_iter()
        .max_by_key(|c| (c.percent(), c.method.precedence()))
}

fn fallback(template: &FolderTemplate) -> RoutingCandidate {
    RoutingCandidate::new(template.fallback_path(), FALLBACK_CONFIDENCE, Method::Fallback)
}
