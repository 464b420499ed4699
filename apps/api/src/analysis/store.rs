//! Persistence for finished analyses.
//!
//! `AppState` holds an `Arc<dyn AnalysisStore>`; production uses `PgAnalysisStore`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::analysis::models::AnalysisResult;
use crate::models::analysis::AnalysisRow;

/// Everything needed to persist one analysis.
#[derive(Debug, Clone, Copy)]
pub struct NewAnalysis<'a> {
    pub user_id: &'a str,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub file_size: usize,
    pub result: &'a AnalysisResult,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn save(&self, new: NewAnalysis<'_>) -> Result<Uuid>;

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRow>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<AnalysisRow>>;

    /// Returns false when no analysis had this id.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn save(&self, new: NewAnalysis<'_>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let result = serde_json::to_value(new.result).context("Failed to serialize analysis")?;

        sqlx::query(
            r#"
            INSERT INTO resume_analyses
                (id, user_id, file_name, mime_type, file_size, score, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(new.user_id)
        .bind(new.file_name)
        .bind(new.mime_type)
        .bind(new.file_size as i64)
        .bind(new.result.score as i32)
        .bind(result)
        .execute(&self.pool)
        .await
        .context("Failed to insert analysis")?;

        info!("Stored analysis {id} for user {}", new.user_id);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisRow>> {
        let row = sqlx::query_as::<_, AnalysisRow>("SELECT * FROM resume_analyses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load analysis {id}"))?;
        Ok(row)
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<AnalysisRow>> {
        let rows = sqlx::query_as::<_, AnalysisRow>(
            "SELECT * FROM resume_analyses WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list analyses for user {user_id}"))?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM resume_analyses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete analysis {id}"))?
            .rows_affected();

        if deleted > 0 {
            info!("Deleted analysis {id}");
        }
        Ok(deleted > 0)
    }
}
