use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which signal produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Rule,
    Learned,
    Ai,
    Fallback,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Rule => "rule",
            Method::Learned => "learned",
            Method::Ai => "ai",
            Method::Fallback => "fallback",
        }
    }

    /// Rank used to break exact confidence ties; higher wins.
    pub fn precedence(&self) -> u8 {
        match self {
            Method::Learned => 3,
            Method::Rule => 2,
            Method::Ai => 1,
            Method::Fallback => 0,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Method::Rule),
            "learned" => Ok(Method::Learned),
            "ai" => Ok(Method::Ai),
            "fallback" => Ok(Method::Fallback),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

/// A file offered for placement. Owned by the caller for one request.
#[derive(Debug, Clone, Default)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub content: Option<Vec<u8>>,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            content: None,
        }
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn content_hash(&self) -> Option<String> {
        self.content
            .as_deref()
            .map(|bytes| blake3::hash(bytes).to_hex().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingCandidate {
    pub leaf_path: Vec<String>,
    pub confidence: f32,
    pub method: Method,
}

impl RoutingCandidate {
    pub fn new(leaf_path: Vec<String>, confidence: f32, method: Method) -> Self {
        Self {
            leaf_path,
            confidence,
            method,
        }
    }

    pub fn percent(&self) -> u8 {
        to_percent(self.confidence)
    }
}

/// Persisted form of a confidence: rounded percentage, clamped to 0..=100.
pub fn to_percent(confidence: f32) -> u8 {
    if !confidence.is_finite() {
        return 0;
    }
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// What the caller gets back from one `route` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingResult {
    pub record_id: String,
    pub leaf_path: Vec<String>,
    pub confidence: u8,
    pub method: Method,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub signature: String,
    pub leaf_path: Vec<String>,
    pub times_confirmed: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRecord {
    pub id: String,
    pub file_name: String,
    pub signature: String,
    pub template_id: String,
    pub project_id: Option<String>,
    pub suggested_path: Vec<String>,
    pub actual_path: Option<Vec<String>>,
    pub confidence: u8,
    pub method: Method,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reported_at: Option<DateTime<Utc>>,
}

/// Splits `"Amministrativo/Fatture"` into folder labels, ignoring empty
/// segments and surrounding whitespace.
pub fn parse_leaf_path(raw: &str) -> Vec<String> {
    raw.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn format_leaf_path(path: &[String]) -> String {
    path.join("/")
}
