//! Append-only history of routing decisions.

use crate::error::StoreError;
use crate::learned::{decode_path, encode_path, from_millis};
use crate::models::{Method, RoutingRecord};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use storage::models::RecordRow;
use tokio::sync::RwLock;

#[async_trait::async_trait]
pub trait RecordLog: Send + Sync {
    async fn append(&self, record: RoutingRecord) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<RoutingRecord>, StoreError>;

    /// Stores the final placement. Returns `false` when the record already
    /// held exactly this path (or does not exist), `true` when it changed.
    async fn set_actual(
        &self,
        id: &str,
        actual_path: &[String],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Records of one project in creation order.
    async fn list_by_project(&self, project_id: &str) -> Result<Vec<RoutingRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryLogInner {
    records: Vec<RoutingRecord>,
    by_id: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryRecordLog {
    inner: RwLock<MemoryLogInner>,
}

impl MemoryRecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

#[async_trait::async_trait]
impl RecordLog for MemoryRecordLog {
    async fn append(&self, record: RoutingRecord) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&record.id) {
            return Err(StoreError::corrupt(&record.id, "duplicate record id"));
        }
        let id = record.id.clone();
        let index = inner.records.len();
        inner.records.push(record);
        inner.by_id.insert(id.clone(), index);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<RoutingRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(id).map(|&i| inner.records[i].clone()))
    }

    async fn set_actual(
        &self,
        id: &str,
        actual_path: &[String],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(&index) = inner.by_id.get(id) else {
            return Ok(false);
        };
        let record = &mut inner.records[index];
        if record.actual_path.as_deref() == Some(actual_path) {
            return Ok(false);
        }
        record.actual_path = Some(actual_path.to_vec());
        record.reported_at = Some(at);
        Ok(true)
    }

    async fn list_by_project(&self, project_id: &str) -> Result<Vec<RoutingRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }
}

/// Records persisted in the `routing_records` table.
#[derive(Debug, Clone)]
pub struct SqliteRecordLog {
    pool: SqlitePool,
}

impl SqliteRecordLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn record_to_row(record: &RoutingRecord) -> RecordRow {
    RecordRow {
        id: record.id.clone(),
        file_name: record.file_name.clone(),
        signature: record.signature.clone(),
        template_id: record.template_id.clone(),
        project_id: record.project_id.clone(),
        suggested_path: encode_path(&record.suggested_path),
        actual_path: record.actual_path.as_deref().map(encode_path),
        confidence: i64::from(record.confidence),
        method: record.method.as_str().to_string(),
        content_hash: record.content_hash.clone(),
        created_at: record.created_at.timestamp_millis(),
        reported_at: record.reported_at.map(|t| t.timestamp_millis()),
    }
}

fn record_from_row(row: RecordRow) -> Result<RoutingRecord, StoreError> {
    let key = row.id.as_str();
    let confidence = u8::try_from(row.confidence)
        .ok()
        .filter(|c| *c <= 100)
        .ok_or_else(|| StoreError::corrupt(key, format!("confidence {}", row.confidence)))?;
    let method: Method = row.method.parse().map_err(|e| StoreError::corrupt(key, e))?;
    let suggested_path = decode_path(key, &row.suggested_path)?;
    let actual_path = row
        .actual_path
        .as_deref()
        .map(|raw| decode_path(key, raw))
        .transpose()?;
    let created_at = from_millis(key, row.created_at)?;
    let reported_at = row.reported_at.map(|ms| from_millis(key, ms)).transpose()?;
    Ok(RoutingRecord {
        id: row.id,
        file_name: row.file_name,
        signature: row.signature,
        template_id: row.template_id,
        project_id: row.project_id,
        suggested_path,
        actual_path,
        confidence,
        method,
        content_hash: row.content_hash,
        created_at,
        reported_at,
    })
}

#[async_trait::async_trait]
impl RecordLog for SqliteRecordLog {
    async fn append(&self, record: RoutingRecord) -> Result<String, StoreError> {
        storage::records::insert(&self.pool, &record_to_row(&record)).await?;
        Ok(record.id)
    }

    async fn get(&self, id: &str) -> Result<Option<RoutingRecord>, StoreError> {
        storage::records::get(&self.pool, id)
            .await?
            .map(record_from_row)
            .transpose()
    }

    async fn set_actual(
        &self,
        id: &str,
        actual_path: &[String],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(storage::records::set_actual(
            &self.pool,
            id,
            &encode_path(actual_path),
            at.timestamp_millis(),
        )
        .await?)
    }

    async fn list_by_project(&self, project_id: &str) -> Result<Vec<RoutingRecord>, StoreError> {
        storage::records::list_by_project(&self.pool, project_id)
            .await?
            .into_iter()
            .map(record_from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, project: Option<&str>) -> RoutingRecord {
        RoutingRecord {
            id: id.to_string(),
            file_name: "Fattura 12.pdf".to_string(),
            signature: "fattura".to_string(),
            template_id: "BREVE".to_string(),
            project_id: project.map(str::to_string),
            suggested_path: vec!["Amministrativo".into(), "Fatture".into()],
            actual_path: None,
            confidence: 80,
            method: Method::Rule,
            content_hash: None,
            // Millisecond precision so the SQLite round trip compares equal.
            created_at: from_millis(id, 1_700_000_000_123).unwrap(),
            reported_at: None,
        }
    }

    async fn exercise(log: &dyn RecordLog) {
        log.append(record("a", Some("p1"))).await.unwrap();
        log.append(record("b", Some("p2"))).await.unwrap();
        log.append(record("c", Some("p1"))).await.unwrap();
        log.append(record("d", None)).await.unwrap();

        let ids: Vec<String> = log
            .list_by_project("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(log.get("a").await.unwrap().unwrap(), record("a", Some("p1")));

        let at = from_millis("a", 1_700_000_100_000).unwrap();
        let path = vec!["Contabilita".to_string()];
        assert!(log.set_actual("a", &path, at).await.unwrap());
        assert!(!log.set_actual("a", &path, at).await.unwrap());
        assert!(!log.set_actual("missing", &path, at).await.unwrap());

        let stored = log.get("a").await.unwrap().unwrap();
        assert_eq!(stored.actual_path, Some(path));
        assert_eq!(stored.reported_at, Some(at));
        assert_eq!(stored.suggested_path, record("a", None).suggested_path);
        assert!(log.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_log_behaviour() {
        let log = MemoryRecordLog::new();
        exercise(&log).await;
        assert_eq!(log.len().await, 4);
        assert!(log.append(record("a", None)).await.is_err());
    }

    #[tokio::test]
    async fn sqlite_log_behaviour() {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        let log = SqliteRecordLog::new(pool);
        exercise(&log).await;
        assert!(log.append(record("a", None)).await.is_err());
    }
}
