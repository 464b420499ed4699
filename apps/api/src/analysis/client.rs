//! Turns one (resume, job context) pair into one validated `AnalysisResult`.
//!
//! Pipeline: validate inputs → base64 the document → render the prompt → one upstream
//! call (bounded by a timeout, never retried) → extract JSON → validate shape → normalize
//! → attach metadata. Input errors are raised before any network call.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::extract::extract_json;
use crate::analysis::models::{
    AnalysisMetadata, AnalysisResult, DocumentKind, JobContext, ResumeDocument,
};
use crate::analysis::normalize::PromptVariant;
use crate::analysis::prompts::render_prompt;
use crate::llm_client::{GenerateContentRequest, GenerativeBackend, LlmError, ResponseMode};

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unsupported file type '{0}': upload a PDF or Word document (DOC/DOCX)")]
    UnsupportedFileType(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Document is {size} bytes; the limit is {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("Upstream analysis call failed: {0}")]
    UpstreamCallFailed(#[from] LlmError),

    /// `raw` is kept for internal diagnostics and never rendered.
    #[error("Malformed model response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    /// `raw` is kept for internal diagnostics and never rendered.
    #[error("Invalid analysis structure: {reason}")]
    InvalidStructure { reason: String, raw: String },
}

impl AnalysisError {
    /// True for errors caused by the submission itself, raised before any upstream call.
    pub fn is_client_input(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileType(_) | Self::MissingRequiredField(_) | Self::DocumentTooLarge { .. }
        )
    }

    /// Raw upstream text, when the failure happened after a response was received.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw, .. } | Self::InvalidStructure { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Tunables for `AnalysisClient`, taken from `Config` at startup.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub variant: PromptVariant,
    pub mode: ResponseMode,
    pub timeout: Duration,
    pub max_document_bytes: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            variant: PromptVariant::default(),
            mode: ResponseMode::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

/// Stateless analysis client. Cheap to clone; safe to share across concurrent requests.
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn GenerativeBackend>,
    settings: AnalyzerSettings,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: AnalyzerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub async fn analyze(
        &self,
        document: &ResumeDocument,
        context: &JobContext,
    ) -> Result<AnalysisResult, AnalysisError> {
        let kind = self.validate_document(document)?;
        validate_context(context)?;

        let requested_at = Utc::now();
        let variant = self.settings.variant;

        let prompt = render_prompt(variant.template(), context);
        let request = GenerateContentRequest::with_inline_attachment(
            kind.mime_type(),
            STANDARD.encode(&document.bytes),
            prompt,
        );

        info!(
            "Analyzing '{}' ({} bytes, {:?}) for '{}' with prompt {}",
            document.file_name,
            document.size(),
            kind,
            context.job_title,
            variant.version()
        );

        let raw = self.call_upstream(&request).await?;
        let mut result = parse_response(&raw, variant)?;
        result.metadata = AnalysisMetadata::for_request(context, variant.version(), requested_at);

        debug!("Analysis complete: score={}", result.score);
        Ok(result)
    }

    fn validate_document(&self, document: &ResumeDocument) -> Result<DocumentKind, AnalysisError> {
        let kind = DocumentKind::from_mime(&document.mime_type)
            .ok_or_else(|| AnalysisError::UnsupportedFileType(document.mime_type.clone()))?;

        if document.bytes.is_empty() {
            return Err(AnalysisError::MissingRequiredField("document"));
        }

        let limit = self.settings.max_document_bytes;
        if document.size() > limit {
            return Err(AnalysisError::DocumentTooLarge {
                size: document.size(),
                limit,
            });
        }

        Ok(kind)
    }

    async fn call_upstream(&self, request: &GenerateContentRequest) -> Result<String, AnalysisError> {
        let timeout = self.settings.timeout;
        match tokio::time::timeout(timeout, self.backend.generate(request, self.settings.mode)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!("Upstream analysis call failed: {e}");
                Err(AnalysisError::UpstreamCallFailed(e))
            }
            Err(_) => {
                warn!("Upstream analysis call timed out after {}s", timeout.as_secs());
                Err(AnalysisError::UpstreamCallFailed(LlmError::Timeout(timeout.as_secs())))
            }
        }
    }
}

fn validate_context(context: &JobContext) -> Result<(), AnalysisError> {
    let required = [
        ("jobTitle", &context.job_title),
        ("industry", &context.industry),
        ("experienceLevel", &context.experience_level),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AnalysisError::MissingRequiredField(field));
        }
    }
    if context.cleaned_skills().is_empty() {
        return Err(AnalysisError::MissingRequiredField("skills"));
    }
    Ok(())
}

/// Extracts, validates and normalizes raw model text. Metadata is left at its default.
pub fn parse_response(raw: &str, variant: PromptVariant) -> Result<AnalysisResult, AnalysisError> {
    let value = extract_json(raw).map_err(|e| AnalysisError::MalformedResponse {
        reason: e.to_string(),
        raw: raw.to_string(),
    })?;

    let object = variant
        .validate_structure(&value)
        .map_err(|reason| AnalysisError::InvalidStructure {
            reason,
            raw: raw.to_string(),
        })?;

    Ok(variant.normalize(object))
}
