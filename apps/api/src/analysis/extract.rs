//! Isolates the JSON object inside free-form model output.
//!
//! Models wrap JSON in markdown fences or surround it with prose despite being told not
//! to. Candidates are tried in order: the first fenced block, then the span from the
//! first `{` to the last `}`. The first candidate that parses wins.

use serde_json::Value;
use thiserror::Error;

/// Why no JSON could be recovered from the model text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJsonRegion,

    /// Candidate regions were found but none parsed; carries the last parse error.
    #[error("model output is not valid JSON: {0}")]
    Unparseable(String),
}

pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let candidates = [first_fenced_block(text), outer_brace_span(text)];

    let mut last_error = None;
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(last_error.map_or(ExtractError::NoJsonRegion, ExtractError::Unparseable))
}

/// Body of the first ``` fenced block, with any info string (```json) dropped.
fn first_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // The info string runs to the end of the opening line.
    let body_start = after_fence.find('\n').map_or(0, |nl| nl + 1);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    let block = body[..close].trim();
    (!block.is_empty()).then_some(block)
}

/// Span from the first `{` to the last `}`, inclusive.
fn outer_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
