use crate::models::Method;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the router. Per-signal problems never end up here.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("unknown routing record: {0}")]
    UnknownRecord(String),
    #[error("invalid placement {path:?} for template {template_id}")]
    InvalidPlacement {
        template_id: String,
        path: Vec<String>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub(crate) fn corrupt(key: &str, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl From<providers::ProviderError> for ClassifierError {
    fn from(err: providers::ProviderError) -> Self {
        match err {
            providers::ProviderError::MalformedResponse(msg) => ClassifierError::Malformed(msg),
            other => ClassifierError::Unavailable(other.to_string()),
        }
    }
}

/// A candidate whose path does not exist in the resolved template.
#[derive(Debug, Error)]
#[error("{method} candidate {path:?} is not a folder of template {template_id}")]
pub struct CandidateRejected {
    pub method: Method,
    pub template_id: String,
    pub path: Vec<String>,
}
