use crate::models::PatternRow;
use sqlx::SqlitePool;

pub async fn get(pool: &SqlitePool, signature: &str) -> sqlx::Result<Option<PatternRow>> {
    sqlx::query_as::<_, PatternRow>(
        "SELECT signature, leaf_path, times_confirmed, updated_at FROM learned_patterns WHERE signature = ?1",
    )
    .bind(signature)
    .fetch_optional(pool)
    .await
}

/// Inserts or updates a pattern in one statement. A matching path bumps the
/// count, a different path replaces it and restarts the count at 1.
pub async fn confirm(
    pool: &SqlitePool,
    signature: &str,
    leaf_path: &str,
    now_ms: i64,
) -> sqlx::Result<PatternRow> {
    sqlx::query_as::<_, PatternRow>(
        r#"
        INSERT INTO learned_patterns (signature, leaf_path, times_confirmed, updated_at)
        VALUES (?1, ?2, 1, ?3)
        ON CONFLICT(signature) DO UPDATE SET
            times_confirmed = CASE
                WHEN learned_patterns.leaf_path = excluded.leaf_path
                THEN learned_patterns.times_confirmed + 1
                ELSE 1
            END,
            leaf_path = excluded.leaf_path,
            updated_at = excluded.updated_at
        RETURNING signature, leaf_path, times_confirmed, updated_at
        "#,
    )
    .bind(signature)
    .bind(leaf_path)
    .bind(now_ms)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &SqlitePool, signature: &str) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM learned_patterns WHERE signature = ?1")
        .bind(signature)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn list(pool: &SqlitePool) -> sqlx::Result<Vec<PatternRow>> {
    sqlx::query_as::<_, PatternRow>(
        "SELECT signature, leaf_path, times_confirmed, updated_at FROM learned_patterns ORDER BY signature",
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect, migrate};

    #[tokio::test]
    async fn confirm_counts_and_resets() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        let first = confirm(&pool, "fattura", r#"["Amministrativo","Fatture"]"#, 1).await.unwrap();
        assert_eq!(first.times_confirmed, 1);
        let second = confirm(&pool, "fattura", r#"["Amministrativo","Fatture"]"#, 2).await.unwrap();
        assert_eq!(second.times_confirmed, 2);
        let moved = confirm(&pool, "fattura", r#"["Contabilita"]"#, 3).await.unwrap();
        assert_eq!(moved.times_confirmed, 1);
        assert_eq!(moved.leaf_path, r#"["Contabilita"]"#);
        assert_eq!(moved.updated_at, 3);

        assert!(delete(&pool, "fattura").await.unwrap());
        assert!(!delete(&pool, "fattura").await.unwrap());
        assert!(get(&pool, "fattura").await.unwrap().is_none());
    }
}
