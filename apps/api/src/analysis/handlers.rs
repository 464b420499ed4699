//! Axum route handlers for the Analysis API.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, JobContext, ResumeDocument};
use crate::analysis::store::NewAnalysis;
use crate::errors::AppError;
use crate::models::analysis::AnalysisRow;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub analysis: AnalysisResult,
    pub file: FileInfo,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysisResponse {
    pub id: Uuid,
    pub user_id: String,
    pub analysis: AnalysisResult,
    pub file: FileInfo,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: Uuid,
    pub file_name: String,
    pub score: i32,
    pub job_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub limit: Option<i64>,
}

/// The parts of a multipart analysis submission.
struct Submission {
    user_id: String,
    document: ResumeDocument,
    context: JobContext,
}

impl TryFrom<AnalysisRow> for StoredAnalysisResponse {
    type Error = AppError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let analysis = row
            .analysis()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored analysis {} is corrupt: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            analysis,
            file: FileInfo {
                name: row.file_name,
                size: usize::try_from(row.file_size).unwrap_or_default(),
                mime_type: row.mime_type,
            },
            created_at: row.created_at,
        })
    }
}

impl From<AnalysisRow> for AnalysisSummary {
    fn from(row: AnalysisRow) -> Self {
        let job_title = row
            .result
            .pointer("/metadata/jobTitle")
            .and_then(|v| v.as_str())
            .map(String::from);
        Self {
            id: row.id,
            file_name: row.file_name,
            score: row.score,
            job_title,
            created_at: row.created_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyses
///
/// Multipart form: `resume` (file), `details` (JSON job context), `user_id`.
/// Runs the analysis, stores it, and returns it with the new analysis id.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let submission = read_submission(multipart).await?;
    let document = &submission.document;

    let analysis = state
        .analyzer
        .analyze(document, &submission.context)
        .await?;

    let analysis_id = state
        .store
        .save(NewAnalysis {
            user_id: &submission.user_id,
            file_name: &document.file_name,
            mime_type: &document.mime_type,
            file_size: document.size(),
            result: &analysis,
        })
        .await?;

    info!(
        "Analysis {analysis_id} completed for user {} (score {})",
        submission.user_id, analysis.score
    );

    Ok(Json(AnalyzeResponse {
        analysis_id,
        file: FileInfo {
            name: document.file_name.clone(),
            size: document.size(),
            mime_type: document.mime_type.clone(),
        },
        analysis,
    }))
}

/// GET /api/v1/analyses/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredAnalysisResponse>, AppError> {
    let row = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))?;

    Ok(Json(row.try_into()?))
}

/// GET /api/v1/analyses?user_id=&limit=
///
/// Newest first. `limit` defaults to 20 and is clamped to 1 – 100.
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<AnalysisSummary>>, AppError> {
    if params.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let rows = state
        .store
        .list_for_user(params.user_id.trim(), limit)
        .await?;

    Ok(Json(rows.into_iter().map(AnalysisSummary::from).collect()))
}

/// DELETE /api/v1/analyses/:id
pub async fn handle_delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete(id).await? {
        return Err(AppError::NotFound(format!("Analysis {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Multipart parsing
// ────────────────────────────────────────────────────────────────────────────

async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut document = None;
    let mut details = None;
    let mut user_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => document = Some(read_document(field).await?),
            "details" => details = Some(read_text(field).await?),
            "user_id" => user_id = Some(read_text(field).await?),
            _ => {}
        }
    }

    let document =
        document.ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;
    let details =
        details.ok_or_else(|| AppError::Validation("details are required".to_string()))?;
    let user_id = user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let context: JobContext = serde_json::from_str(&details)
        .map_err(|e| AppError::Validation(format!("Invalid details format: {e}")))?;

    Ok(Submission {
        user_id,
        document,
        context,
    })
}

async fn read_document(field: Field<'_>) -> Result<ResumeDocument, AppError> {
    let file_name = field.file_name().unwrap_or("resume").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| multipart_error("Failed to read resume file", e))?;
    Ok(ResumeDocument::new(bytes, mime_type, file_name))
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| multipart_error(&format!("Failed to read field '{name}'"), e))
}

/// A body over `DefaultBodyLimit` surfaces as a multipart error; keep it a 413.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{context}: request body exceeds the upload limit"))
    } else {
        AppError::Validation(format!("{context}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::client::{AnalysisClient, AnalyzerSettings};
    use crate::analysis::store::AnalysisStore;
    use crate::llm_client::{GenerateContentRequest, GenerativeBackend, LlmError, ResponseMode};
    use crate::routes::build_router;

    const BOUNDARY: &str = "analysis-test-boundary";

    struct CannedBackend {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeBackend for CannedBackend {
        async fn generate(
            &self,
            _request: &GenerateContentRequest,
            _mode: ResponseMode,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<AnalysisRow>>,
    }

    #[async_trait]
    impl AnalysisStore for MemoryStore {
        async fn save(&self, new: NewAnalysis<'_>) -> anyhow::Result<Uuid> {
            let id = Uuid::new_v4();
            self.rows.lock().unwrap().push(AnalysisRow {
                id,
                user_id: new.user_id.to_string(),
                file_name: new.file_name.to_string(),
                mime_type: new.mime_type.to_string(),
                file_size: new.file_size as i64,
                score: new.result.score as i32,
                result: serde_json::to_value(new.result)?,
                created_at: Utc::now(),
            });
            Ok(id)
        }

        async fn get(&self, id: Uuid) -> anyhow::Result<Option<AnalysisRow>> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn list_for_user(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<AnalysisRow>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .rev()
                .filter(|r| r.user_id == user_id)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(rows.len() < before)
        }
    }

    fn app(reply: &str) -> (Router, Arc<CannedBackend>, Arc<MemoryStore>) {
        let backend = Arc::new(CannedBackend {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::default());
        let state = AppState {
            analyzer: AnalysisClient::new(backend.clone(), AnalyzerSettings::default()),
            store: store.clone(),
        };
        (build_router(state), backend, store)
    }

    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, mime)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn analyze_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/analyses")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const DETAILS: &str = r#"{"jobTitle":"Data Engineer","industry":"Finance","experienceLevel":"1-3","skills":["Python","SQL"]}"#;

    #[tokio::test]
    async fn test_analyze_then_fetch_by_id() {
        let (router, backend, _store) =
            app(r#"Result: {"score": 81, "suggestions": ["Add dbt"], "missingKeywords": ["Airflow"]}"#);

        let body = multipart_body(&[
            ("resume", Some(("cv.pdf", "application/pdf")), b"%PDF-1.4 data"),
            ("details", None, DETAILS.as_bytes()),
            ("user_id", None, b"user_42"),
        ]);
        let response = router.clone().oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["analysis"]["score"], 81);
        assert_eq!(json["analysis"]["missingKeywords"][0], "Airflow");
        assert_eq!(json["analysis"]["metadata"]["jobTitle"], "Data Engineer");
        assert_eq!(json["file"]["name"], "cv.pdf");
        assert_eq!(json["file"]["type"], "application/pdf");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let id = json["analysisId"].as_str().unwrap();
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/analyses/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["userId"], "user_42");
        assert_eq!(json["analysis"]["suggestions"][0], "Add dbt");
    }

    #[tokio::test]
    async fn test_analyze_rejects_png_with_415() {
        let (router, backend, store) = app(r#"{"score": 50}"#);
        let body = multipart_body(&[
            ("resume", Some(("cv.png", "image/png")), b"\x89PNG"),
            ("details", None, DETAILS.as_bytes()),
            ("user_id", None, b"user_42"),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_requires_user_id() {
        let (router, _backend, _store) = app(r#"{"score": 50}"#);
        let body = multipart_body(&[
            ("resume", Some(("cv.pdf", "application/pdf")), b"%PDF"),
            ("details", None, DETAILS.as_bytes()),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_details_json() {
        let (router, _backend, _store) = app(r#"{"score": 50}"#);
        let body = multipart_body(&[
            ("resume", Some(("cv.pdf", "application/pdf")), b"%PDF"),
            ("details", None, b"{not json"),
            ("user_id", None, b"user_42"),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_generic_502() {
        let (router, _backend, store) = app("I am unable to help with that request.");
        let body = multipart_body(&[
            ("resume", Some(("cv.docx", crate::analysis::models::DocumentKind::DOCX_MIME)), b"PK\x03\x04"),
            ("details", None, DETAILS.as_bytes()),
            ("user_id", None, b"user_42"),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "ANALYSIS_FAILED");
        assert!(!json.to_string().contains("unable to help"));
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_analysis_is_404() {
        let (router, _backend, _store) = app(r#"{"score": 50}"#);
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/analyses/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_returns_newest_first_summaries() {
        let (router, _backend, store) = app(r#"{"score": 50}"#);
        for score in [10, 20, 30] {
            let result = AnalysisResult {
                score,
                ..Default::default()
            };
            store
                .save(NewAnalysis {
                    user_id: "user_7",
                    file_name: "cv.pdf",
                    mime_type: "application/pdf",
                    file_size: 100,
                    result: &result,
                })
                .await
                .unwrap();
        }

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/analyses?user_id=user_7&limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let scores: Vec<i64> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["score"].as_i64().unwrap())
            .collect();
        assert_eq!(scores, vec![30, 20]);
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_413() {
        let (router, backend, store) = app(r#"{"score": 50}"#);
        let oversized = vec![b'x'; 7 * 1024 * 1024];
        let body = multipart_body(&[
            ("details", None, DETAILS.as_bytes()),
            ("user_id", None, b"user_42"),
            ("resume", Some(("cv.pdf", "application/pdf")), oversized.as_slice()),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_analysis_then_404() {
        let (router, _backend, store) = app(r#"{"score": 50}"#);
        let result = AnalysisResult {
            score: 64,
            ..Default::default()
        };
        let id = store
            .save(NewAnalysis {
                user_id: "user_9",
                file_name: "cv.pdf",
                mime_type: "application/pdf",
                file_size: 100,
                result: &result,
            })
            .await
            .unwrap();

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/analyses/{id}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = router.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.rows.lock().unwrap().is_empty());

        let response = router.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/analyses/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
