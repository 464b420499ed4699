use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::models::AnalysisResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub user_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub score: i32,
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRow {
    /// Decodes the stored JSONB back into the canonical result.
    pub fn analysis(&self) -> Result<AnalysisResult, serde_json::Error> {
        serde_json::from_value(self.result.clone())
    }
}
