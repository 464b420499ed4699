// Versioned prompt templates for resume analysis.
// Each template embeds the exact JSON schema its parser in `normalize` expects,
// so a template and its adapter change together. Bump the version when either does.
//
// Slots: {persona}, {job_title}, {industry}, {experience_level}, {skills},
//        {job_description}, {json_only}

use crate::analysis::models::JobContext;
use crate::llm_client::prompts::{ANALYST_PERSONA, JSON_ONLY_INSTRUCTION};

pub const DETAILED_PROMPT_VERSION: &str = "detailed-v3";
pub const FLAT_PROMPT_VERSION: &str = "flat-v1";
pub const ATS_PROMPT_VERSION: &str = "ats-v1";

/// Canonical schema: score, suggestions, missingKeywords and a nested detailedAnalysis.
pub const DETAILED_PROMPT_TEMPLATE: &str = r#"{persona}

Analyze the attached resume against the target role below and score how well it matches.

Job Application Details:
- Job Title: {job_title}
- Industry: {industry}
- Experience Level: {experience_level}
- Key Skills to Highlight: {skills}
{job_description}
Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 85,
  "suggestions": ["Specific improvement to make to the resume"],
  "missingKeywords": ["Important keyword for the role that the resume lacks"],
  "detailedAnalysis": {
    "strengths": ["What the resume does well"],
    "weaknesses": ["What the resume does poorly"],
    "skillMatch": {
      "matching": ["Required skills present in the resume"],
      "missing": ["Required skills absent from the resume"],
      "additional": ["Relevant skills the resume shows beyond the requirements"]
    },
    "recommendations": {
      "immediate": ["Changes to make before applying"],
      "longTerm": ["Skills or experience to build over time"]
    },
    "technicalSkillsAnalysis": {
      "frontend": {"skills": ["React"], "proficiency": 70, "gaps": ["Accessibility"]},
      "backend": {"skills": [], "proficiency": 0, "gaps": []},
      "devops": {"skills": [], "proficiency": 0, "gaps": []},
      "databases": {"skills": [], "proficiency": 0, "gaps": []}
    }
  }
}

Rules:
- "score" is an integer between 0 and 100: how well the resume matches the role.
- Every "proficiency" is an integer between 0 and 100.
- Use empty arrays when a list has nothing to report. Never omit a field.
- Suggestions must be specific to this resume, not generic advice.

{json_only}"#;

/// Flat schema: score, strengths, improvements, keywords, recommendations.
pub const FLAT_PROMPT_TEMPLATE: &str = r#"{persona}

Analyze this resume and provide a detailed assessment in JSON format.

Job Application Details:
- Job Title: {job_title}
- Industry: {industry}
- Experience Level: {experience_level}
- Key Skills to Highlight: {skills}
{job_description}
IMPORTANT: Your response must be a valid JSON object with the following structure:
{
  "score": number (0-100),
  "strengths": string[],
  "improvements": string[],
  "keywords": string[],
  "recommendations": string[]
}

"keywords" lists important keywords for the role that are missing from the resume.

{json_only}"#;

/// ATS schema: atsScore, matchScore, keyFindings, skillsAnalysis, formatAnalysis.
pub const ATS_PROMPT_TEMPLATE: &str = r#"{persona}

Analyze this resume for a {job_title} position in the {industry} industry.
Experience Level: {experience_level}
Key skills to focus on: {skills}
{job_description}
Provide a detailed analysis in the following JSON format:
{
  "atsScore": number between 0-100,
  "matchScore": number between 0-100,
  "keyFindings": array of strings with main observations,
  "skillsAnalysis": {
    "present": array of strings with skills found in resume,
    "missing": array of strings with required skills not found,
    "recommended": array of strings with suggested additional skills
  },
  "formatAnalysis": {
    "strengths": array of strings with format strengths,
    "weaknesses": array of strings with format weaknesses
  },
  "improvementSuggestions": array of strings with specific recommendations
}

{json_only}"#;

/// Fills a template's slots from the job context, exactly as submitted.
pub fn render_prompt(template: &str, context: &JobContext) -> String {
    let skills = context.skills.join(", ");
    let job_description = context
        .job_description()
        .map(|d| format!("- Job Description: {d}\n"))
        .unwrap_or_default();

    render_template(
        template,
        &[
            ("persona", ANALYST_PERSONA),
            ("job_title", context.job_title.as_str()),
            ("industry", context.industry.as_str()),
            ("experience_level", context.experience_level.as_str()),
            ("skills", skills.as_str()),
            ("job_description", job_description.as_str()),
            ("json_only", JSON_ONLY_INSTRUCTION),
        ],
    )
}

/// Single-pass `{slot}` substitution.
///
/// Unknown `{...}` sequences (the JSON schema examples) are copied as-is, and
/// substituted values are never rescanned, so user text containing `{industry}`
/// stays literal.
fn render_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match slot {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
