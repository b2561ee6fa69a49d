use crate::models::RecordRow;
use sqlx::SqlitePool;

const COLUMNS: &str = "id, file_name, signature, template_id, project_id, suggested_path, \
     actual_path, confidence, method, content_hash, created_at, reported_at";

pub async fn insert(pool: &SqlitePool, row: &RecordRow) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO routing_records
            (id, file_name, signature, template_id, project_id, suggested_path,
             actual_path, confidence, method, content_hash, created_at, reported_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&row.id)
    .bind(&row.file_name)
    .bind(&row.signature)
    .bind(&row.template_id)
    .bind(&row.project_id)
    .bind(&row.suggested_path)
    .bind(&row.actual_path)
    .bind(row.confidence)
    .bind(&row.method)
    .bind(&row.content_hash)
    .bind(row.created_at)
    .bind(row.reported_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<RecordRow>> {
    sqlx::query_as::<_, RecordRow>(&format!(
        "SELECT {COLUMNS} FROM routing_records WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Sets `actual_path` unless it already holds the same value. Returns whether
/// a row changed.
pub async fn set_actual(
    pool: &SqlitePool,
    id: &str,
    actual_path: &str,
    now_ms: i64,
) -> sqlx::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE routing_records
        SET actual_path = ?2, reported_at = ?3
        WHERE id = ?1 AND (actual_path IS NULL OR actual_path != ?2)
        "#,
    )
    .bind(id)
    .bind(actual_path)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn list_by_project(pool: &SqlitePool, project_id: &str) -> sqlx::Result<Vec<RecordRow>> {
    sqlx::query_as::<_, RecordRow>(&format!(
        "SELECT {COLUMNS} FROM routing_records WHERE project_id = ?1 ORDER BY seq"
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await
}
