//! Maps each upstream response schema into the canonical `AnalysisResult`.
//!
//! The model is loosely typed: fields go missing, change type, or come back in an older
//! schema. Each `PromptVariant` owns a template, the key that carries its score, and an
//! adapter. Adapters default every field independently and never fail; only the minimal
//! shape check in `validate_structure` can reject a response.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::analysis::models::{
    AnalysisMetadata, AnalysisResult, DetailedAnalysis, Recommendations, SkillMatch,
    TechnicalSkillCategory, TechnicalSkillsAnalysis,
};
use crate::analysis::prompts::{
    ATS_PROMPT_TEMPLATE, ATS_PROMPT_VERSION, DETAILED_PROMPT_TEMPLATE, DETAILED_PROMPT_VERSION,
    FLAT_PROMPT_TEMPLATE, FLAT_PROMPT_VERSION,
};

/// Upstream response schema the prompt asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptVariant {
    /// `score / suggestions / missingKeywords / detailedAnalysis{...}` (canonical)
    #[default]
    Detailed,
    /// `score / strengths / improvements / keywords / recommendations`
    Flat,
    /// `atsScore / matchScore / keyFindings / skillsAnalysis / formatAnalysis / improvementSuggestions`
    Ats,
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(Self::Detailed),
            "flat" => Ok(Self::Flat),
            "ats" => Ok(Self::Ats),
            other => Err(format!(
                "unknown prompt variant '{other}' (expected detailed, flat or ats)"
            )),
        }
    }
}

impl PromptVariant {
    pub fn template(&self) -> &'static str {
        match self {
            Self::Detailed => DETAILED_PROMPT_TEMPLATE,
            Self::Flat => FLAT_PROMPT_TEMPLATE,
            Self::Ats => ATS_PROMPT_TEMPLATE,
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Self::Detailed => DETAILED_PROMPT_VERSION,
            Self::Flat => FLAT_PROMPT_VERSION,
            Self::Ats => ATS_PROMPT_VERSION,
        }
    }

    /// Key holding the overall score in this variant's schema.
    pub fn score_key(&self) -> &'static str {
        match self {
            Self::Detailed | Self::Flat => "score",
            Self::Ats => "atsScore",
        }
    }

    /// Checks the minimal shape: a JSON object with a numeric score.
    pub fn validate_structure<'a>(&self, value: &'a Value) -> Result<&'a Map<String, Value>, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_type(value)))?;
        let key = self.score_key();
        match object.get(key) {
            Some(score) if score.is_number() => Ok(object),
            Some(other) => Err(format!("'{key}' must be a number, got {}", json_type(other))),
            None => Err(format!("missing required field '{key}'")),
        }
    }

    /// Maps a validated response object into the canonical result.
    /// `metadata` is left at its default; the caller attaches it.
    pub fn normalize(&self, object: &Map<String, Value>) -> AnalysisResult {
        match self {
            Self::Detailed => normalize_detailed(object),
            Self::Flat => normalize_flat(object),
            Self::Ats => normalize_ats(object),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Adapters
// ────────────────────────────────────────────────────────────────────────────

fn normalize_detailed(object: &Map<String, Value>) -> AnalysisResult {
    let suggestions = match object.get("suggestions") {
        Some(v) => string_list(Some(v)),
        None => string_list(object.get("improvementSuggestions")),
    };

    AnalysisResult {
        score: percent(object.get("score")),
        suggestions,
        missing_keywords: string_list(object.get("missingKeywords")),
        detailed_analysis: object
            .get("detailedAnalysis")
            .and_then(Value::as_object)
            .map(detailed_analysis),
        metadata: AnalysisMetadata::default(),
    }
}

fn detailed_analysis(detail: &Map<String, Value>) -> DetailedAnalysis {
    let skill_match = match detail.get("skillMatch").and_then(Value::as_object) {
        Some(m) => SkillMatch {
            matching: string_list(m.get("matching")),
            missing: string_list(m.get("missing")),
            additional: string_list(m.get("additional")),
        },
        // Older prompts returned a flat `skillMatches` list.
        None => SkillMatch {
            matching: string_list(detail.get("skillMatches")),
            ..Default::default()
        },
    };

    let recommendations = match detail.get("recommendations") {
        Some(Value::Object(r)) => Recommendations {
            immediate: string_list(r.get("immediate")),
            long_term: string_list(r.get("longTerm")),
        },
        Some(list @ Value::Array(_)) => Recommendations {
            immediate: string_list(Some(list)),
            long_term: Vec::new(),
        },
        _ => Recommendations::default(),
    };

    let technical_skills_analysis = detail
        .get("technicalSkillsAnalysis")
        .and_then(Value::as_object)
        .map(|t| TechnicalSkillsAnalysis {
            frontend: skill_category(t.get("frontend")),
            backend: skill_category(t.get("backend")),
            devops: skill_category(t.get("devops")),
            databases: skill_category(t.get("databases")),
        })
        .unwrap_or_default();

    DetailedAnalysis {
        strengths: string_list(detail.get("strengths")),
        weaknesses: string_list(detail.get("weaknesses")),
        skill_match,
        recommendations,
        technical_skills_analysis,
    }
}

fn skill_category(value: Option<&Value>) -> TechnicalSkillCategory {
    let Some(category) = value.and_then(Value::as_object) else {
        return TechnicalSkillCategory::default();
    };
    TechnicalSkillCategory {
        skills: string_list(category.get("skills")),
        proficiency: percent(category.get("proficiency")),
        gaps: string_list(category.get("gaps")),
    }
}

fn normalize_flat(object: &Map<String, Value>) -> AnalysisResult {
    AnalysisResult {
        score: percent(object.get("score")),
        suggestions: string_list(object.get("improvements")),
        missing_keywords: string_list(object.get("keywords")),
        detailed_analysis: Some(DetailedAnalysis {
            strengths: string_list(object.get("strengths")),
            recommendations: Recommendations {
                immediate: string_list(object.get("recommendations")),
                long_term: Vec::new(),
            },
            ..Default::default()
        }),
        metadata: AnalysisMetadata::default(),
    }
}

fn normalize_ats(object: &Map<String, Value>) -> AnalysisResult {
    let skills = object.get("skillsAnalysis").and_then(Value::as_object);
    let format = object.get("formatAnalysis").and_then(Value::as_object);
    let skills_field = |key: &str| string_list(skills.and_then(|s| s.get(key)));
    let format_field = |key: &str| string_list(format.and_then(|f| f.get(key)));

    // Key findings lead the strengths. `matchScore` has no canonical field.
    let mut strengths = string_list(object.get("keyFindings"));
    strengths.extend(format_field("strengths"));

    AnalysisResult {
        score: percent(object.get("atsScore")),
        suggestions: string_list(object.get("improvementSuggestions")),
        missing_keywords: skills_field("missing"),
        detailed_analysis: Some(DetailedAnalysis {
            strengths,
            weaknesses: format_field("weaknesses"),
            skill_match: SkillMatch {
                matching: skills_field("present"),
                missing: skills_field("missing"),
                additional: skills_field("recommended"),
            },
            ..Default::default()
        }),
        metadata: AnalysisMetadata::default(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field coercion
// ────────────────────────────────────────────────────────────────────────────

/// String items of a JSON array. Anything else yields an empty list; non-string
/// and blank items are dropped.
fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Round-then-clamp into 0 – 100. Non-numeric values yield 0.
fn percent(value: Option<&Value>) -> u32 {
    value
        .and_then(Value::as_f64)
        .map(|n| n.round().clamp(0.0, 100.0) as u32)
        .unwrap_or(0)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
