pub mod health;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::analysis::handlers;
use crate::state::AppState;

/// Multipart overhead allowed on top of the document limit, so an oversized
/// file still reaches the analyzer and is reported as a typed error.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .analyzer
        .settings()
        .max_document_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route(
            "/api/v1/analyses",
            get(handlers::handle_list_analyses).post(handlers::handle_analyze),
        )
        .route(
            "/api/v1/analyses/:id",
            get(handlers::handle_get_analysis).delete(handlers::handle_delete_analysis),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::analysis::client::{AnalysisClient, AnalyzerSettings};
    use crate::analysis::store::{AnalysisStore, NewAnalysis};
    use crate::llm_client::{GenerateContentRequest, GenerativeBackend, LlmError, ResponseMode};
    use crate::models::analysis::AnalysisRow;

    struct Unreachable;

    #[async_trait]
    impl GenerativeBackend for Unreachable {
        async fn generate(
            &self,
            _request: &GenerateContentRequest,
            _mode: ResponseMode,
        ) -> Result<String, LlmError> {
            Err(LlmError::EmptyContent)
        }
    }

    #[async_trait]
    impl AnalysisStore for Unreachable {
        async fn save(&self, _new: NewAnalysis<'_>) -> Result<Uuid> {
            anyhow::bail!("store unavailable")
        }

        async fn get(&self, _id: Uuid) -> Result<Option<AnalysisRow>> {
            anyhow::bail!("store unavailable")
        }

        async fn list_for_user(&self, _user_id: &str, _limit: i64) -> Result<Vec<AnalysisRow>> {
            anyhow::bail!("store unavailable")
        }

        async fn delete(&self, _id: Uuid) -> Result<bool> {
            anyhow::bail!("store unavailable")
        }
    }

    fn router() -> Router {
        build_router(AppState {
            analyzer: AnalysisClient::new(Arc::new(Unreachable), AnalyzerSettings::default()),
            store: Arc::new(Unreachable),
        })
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "resume-analyzer");
        assert_eq!(json["promptVersion"], "detailed-v3");
        assert_eq!(json["streaming"], false);
    }

    #[tokio::test]
    async fn test_store_failure_is_opaque_500() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/analyses/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8_lossy(&bytes);
        assert!(body.contains("INTERNAL_ERROR"));
        assert!(!body.contains("store unavailable"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = router()
            .oneshot(Request::builder().uri("/api/v1/resumes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_huge_document_limit_does_not_overflow() {
        let router = build_router(AppState {
            analyzer: AnalysisClient::new(
                Arc::new(Unreachable),
                AnalyzerSettings {
                    max_document_bytes: usize::MAX,
                    ..Default::default()
                },
            ),
            store: Arc::new(Unreachable),
        });
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
