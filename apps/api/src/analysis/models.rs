use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Target-role metadata supplied with a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    pub job_title: String,
    pub industry: String,
    /// Free text; the UI offers `fresher`, `1-3`, `4-6`, `7+`.
    pub experience_level: String,
    /// Kept in the order the user entered them.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub job_description: Option<String>,
}

impl JobContext {
    /// Skills with blank entries removed, trimmed, original order preserved.
    pub fn cleaned_skills(&self) -> Vec<String> {
        self.skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// The description as entered, or `None` when it is absent or blank.
    pub fn job_description(&self) -> Option<&str> {
        self.job_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
    }
}

/// Resume formats the model accepts as inline attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

impl DocumentKind {
    pub const PDF_MIME: &'static str = "application/pdf";
    pub const DOC_MIME: &'static str = "application/msword";
    pub const DOCX_MIME: &'static str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    /// Matches a declared MIME type, ignoring case and parameters such as `; charset=`.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            Self::PDF_MIME => Some(Self::Pdf),
            Self::DOC_MIME => Some(Self::Doc),
            Self::DOCX_MIME => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => Self::PDF_MIME,
            Self::Doc => Self::DOC_MIME,
            Self::Docx => Self::DOCX_MIME,
        }
    }
}

/// An uploaded resume. The bytes are opaque to the analyzer.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub bytes: bytes::Bytes,
    pub mime_type: String,
    pub file_name: String,
}

impl ResumeDocument {
    pub fn new(
        bytes: impl Into<bytes::Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Canonical result
// ────────────────────────────────────────────────────────────────────────────

/// The normalized analysis. Every list defaults to empty and every number to 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// 0 – 100
    pub score: u32,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailedAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub skill_match: SkillMatch,
    pub recommendations: Recommendations,
    pub technical_skills_analysis: TechnicalSkillsAnalysis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillMatch {
    pub matching: Vec<String>,
    pub missing: Vec<String>,
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recommendations {
    pub immediate: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalSkillsAnalysis {
    pub frontend: TechnicalSkillCategory,
    pub backend: TechnicalSkillCategory,
    pub devops: TechnicalSkillCategory,
    pub databases: TechnicalSkillCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalSkillCategory {
    pub skills: Vec<String>,
    /// 0 – 100
    pub proficiency: u32,
    pub gaps: Vec<String>,
}

/// Request context echoed back for traceability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub timestamp: DateTime<Utc>,
    pub job_title: String,
    pub industry: String,
    pub experience_level: String,
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<String>,
}

impl AnalysisMetadata {
    pub fn for_request(context: &JobContext, prompt_version: &str, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            job_title: context.job_title.clone(),
            industry: context.industry.clone(),
            experience_level: context.experience_level.clone(),
            skills: context.skills.clone(),
            prompt_version: Some(prompt_version.to_string()),
        }
    }
}
