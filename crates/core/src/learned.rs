//! Learned placements keyed by file signature.

use crate::error::StoreError;
use crate::models::{LearnedPattern, Method, RoutingCandidate};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use storage::models::PatternRow;
use tokio::sync::RwLock;

const LEARNED_BASE_CONFIDENCE: f32 = 0.85;
const LEARNED_STEP: f32 = 0.03;
/// Stays below 1.0 so a person can always override a learned placement.
pub const LEARNED_MAX_CONFIDENCE: f32 = 0.97;

/// Confidence contributed by a pattern confirmed `times_confirmed` times.
pub fn learned_confidence(times_confirmed: u32) -> f32 {
    let extra = times_confirmed.saturating_sub(1) as f32;
    (LEARNED_BASE_CONFIDENCE + LEARNED_STEP * extra).min(LEARNED_MAX_CONFIDENCE)
}

impl LearnedPattern {
    pub fn candidate(&self) -> RoutingCandidate {
        RoutingCandidate::new(
            self.leaf_path.clone(),
            learned_confidence(self.times_confirmed),
            Method::Learned,
        )
    }
}

#[async_trait::async_trait]
pub trait PatternStore: Send + Sync {
    /// Exact key match only.
    async fn lookup(&self, signature: &str) -> Result<Option<LearnedPattern>, StoreError>;

    /// Same path bumps the count; a different path replaces it and restarts
    /// the count at 1; a new signature starts at 1.
    async fn confirm(
        &self,
        signature: &str,
        leaf_path: &[String],
    ) -> Result<LearnedPattern, StoreError>;

    /// Administrative removal. Returns whether an entry existed.
    async fn clear(&self, signature: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<LearnedPattern>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryPatternStore {
    patterns: RwLock<HashMap<String, LearnedPattern>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PatternStore for MemoryPatternStore {
    async fn lookup(&self, signature: &str) -> Result<Option<LearnedPattern>, StoreError> {
        Ok(self.patterns.read().await.get(signature).cloned())
    }

    async fn confirm(
        &self,
        signature: &str,
        leaf_path: &[String],
    ) -> Result<LearnedPattern, StoreError> {
        let mut patterns = self.patterns.write().await;
        let now = Utc::now();
        let entry = patterns
            .entry(signature.to_string())
            .and_modify(|p| {
                if p.leaf_path == leaf_path {
                    p.times_confirmed = p.times_confirmed.saturating_add(1);
                } else {
                    p.leaf_path = leaf_path.to_vec();
                    p.times_confirmed = 1;
                }
                p.updated_at = now;
            })
            .or_insert_with(|| LearnedPattern {
                signature: signature.to_string(),
                leaf_path: leaf_path.to_vec(),
                times_confirmed: 1,
                updated_at: now,
            });
        Ok(entry.clone())
    }

    async fn clear(&self, signature: &str) -> Result<bool, StoreError> {
        Ok(self.patterns.write().await.remove(signature).is_some())
    }

    async fn list(&self) -> Result<Vec<LearnedPattern>, StoreError> {
        let mut all: Vec<LearnedPattern> = self.patterns.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.signature.cmp(&b.signature));
        Ok(all)
    }
}

/// Patterns persisted in the `learned_patterns` table.
#[derive(Debug, Clone)]
pub struct SqlitePatternStore {
    pool: SqlitePool,
}

impl SqlitePatternStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn from_millis(key: &str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::corrupt(key, format!("timestamp {ms} out of range")))
}

pub(crate) fn decode_path(key: &str, raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::corrupt(key, e))
}

pub(crate) fn encode_path(path: &[String]) -> String {
    // A list of strings always serializes.
    serde_json::to_string(path).unwrap_or_else(|_| "[]".to_string())
}

fn pattern_from_row(row: PatternRow) -> Result<LearnedPattern, StoreError> {
    let times_confirmed = u32::try_from(row.times_confirmed)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            StoreError::corrupt(&row.signature, format!("times_confirmed {}", row.times_confirmed))
        })?;
    Ok(LearnedPattern {
        leaf_path: decode_path(&row.signature, &row.leaf_path)?,
        updated_at: from_millis(&row.signature, row.updated_at)?,
        times_confirmed,
        signature: row.signature,
    })
}

#[async_trait::async_trait]
impl PatternStore for SqlitePatternStore {
    async fn lookup(&self, signature: &str) -> Result<Option<LearnedPattern>, StoreError> {
        storage::patterns::get(&self.pool, signature)
            .await?
            .map(pattern_from_row)
            .transpose()
    }

    async fn confirm(
        &self,
        signature: &str,
        leaf_path: &[String],
    ) -> Result<LearnedPattern, StoreError> {
        let row = storage::patterns::confirm(
            &self.pool,
            signature,
            &encode_path(leaf_path),
            Utc::now().timestamp_millis(),
        )
        .await?;
        pattern_from_row(row)
    }

    async fn clear(&self, signature: &str) -> Result<bool, StoreError> {
        Ok(storage::patterns::delete(&self.pool, signature).await?)
    }

    async fn list(&self) -> Result<Vec<LearnedPattern>, StoreError> {
        storage::patterns::list(&self.pool)
            .await?
            .into_iter()
            .map(pattern_from_row)
            .collect()
    }
}
