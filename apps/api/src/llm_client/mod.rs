//! Gemini client. Every generative-model call in the analyzer goes through here.
//!
//! RULE: no other module talks to the Gemini REST API. Callers depend on
//! `GenerativeBackend`, never on `reqwest` directly.
//!
//! Calls are not retried. A failure is reported once and the caller decides.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const API_VERSION: &str = "v1beta";
const MAX_OUTPUT_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
}

/// Whether the model output is fetched in one response or as a server-sent event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    #[default]
    Single,
    Streamed,
}

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub safety_settings: Vec<SafetySetting>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContent {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Text {
        text: String,
    },
}

/// Base64 payload tagged with its MIME type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerateContentRequest {
    /// Builds a single user turn carrying an inline attachment followed by the prompt text.
    pub fn with_inline_attachment(mime_type: &str, base64_data: String, prompt: String) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: mime_type.to_string(),
                            data: base64_data,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_HARASSMENT",
                threshold: "BLOCK_ONLY_HIGH",
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Backend seam
// ────────────────────────────────────────────────────────────────────────────

/// Anything that can turn a content request into model text.
///
/// `LlmClient` is the production implementation; tests plug in stubs.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
        mode: ResponseMode,
    ) -> Result<String, LlmError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, mode: ResponseMode) -> String {
        match mode {
            ResponseMode::Single => format!(
                "{}/{API_VERSION}/models/{}:generateContent",
                self.api_base, self.model
            ),
            ResponseMode::Streamed => format!(
                "{}/{API_VERSION}/models/{}:streamGenerateContent?alt=sse",
                self.api_base, self.model
            ),
        }
    }

    async fn send(
        &self,
        request: &GenerateContentRequest,
        mode: ResponseMode,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.endpoint(mode))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn generate_single(&self, request: &GenerateContentRequest) -> Result<String, LlmError> {
        let response = self.send(request, ResponseMode::Single).await?;
        let body: GenerateContentResponse = response.json().await?;

        if let Some(usage) = &body.usage_metadata {
            log_usage(usage, ResponseMode::Single);
        }

        body.text().ok_or_else(|| {
            let finish_reason = body
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!("LLM returned no text (finish_reason={finish_reason})");
            LlmError::EmptyContent
        })
    }

    async fn generate_streamed(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<String, LlmError> {
        let mut response = self.send(request, ResponseMode::Streamed).await?;

        let mut decoder = SseTextDecoder::default();
        while let Some(chunk) = response.chunk().await? {
            decoder.feed(&chunk)?;
        }
        let StreamedReply { text, usage } = decoder.finish()?;

        debug!("LLM stream completed: {} chars", text.len());
        if let Some(usage) = &usage {
            log_usage(usage, ResponseMode::Streamed);
        }

        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerativeBackend for LlmClient {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
        mode: ResponseMode,
    ) -> Result<String, LlmError> {
        match mode {
            ResponseMode::Single => self.generate_single(request).await,
            ResponseMode::Streamed => self.generate_streamed(request).await,
        }
    }
}

fn log_usage(usage: &UsageMetadata, mode: ResponseMode) {
    debug!(
        "LLM call succeeded ({mode:?}): prompt_tokens={}, output_tokens={}",
        usage.prompt_token_count, usage.candidates_token_count
    );
}

/// Text and the last reported token usage of one SSE stream.
#[derive(Debug)]
struct StreamedReply {
    text: String,
    usage: Option<UsageMetadata>,
}

/// Incremental decoder for `alt=sse` streams.
///
/// Bytes are buffered until a full line is available, so events split across
/// network chunks (including inside a UTF-8 sequence) decode correctly. Text is
/// appended strictly in arrival order.
#[derive(Debug, Default)]
struct SseTextDecoder {
    pending: Vec<u8>,
    text: String,
    usage: Option<UsageMetadata>,
}

impl SseTextDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle_line(&line)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<StreamedReply, LlmError> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&line)?;
        }
        Ok(StreamedReply {
            text: self.text,
            usage: self.usage,
        })
    }

    fn handle_line(&mut self, line: &[u8]) -> Result<(), LlmError> {
        let line = String::from_utf8_lossy(line);
        let Some(data) = line.trim_end().strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }
        let event: GenerateContentResponse = serde_json::from_str(data)?;
        if let Some(text) = event.text() {
            self.text.push_str(&text);
        }
        // Gemini reports cumulative usage; the last event wins.
        if event.usage_metadata.is_some() {
            self.usage = event.usage_metadata;
        }
        Ok(())
    }
}
