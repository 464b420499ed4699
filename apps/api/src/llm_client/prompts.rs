// Shared prompt fragments used by every analysis prompt template.
// Variant-specific templates live next to their parsers in analysis::prompts.

/// Analyst persona that opens every analysis prompt.
pub const ANALYST_PERSONA: &str = "You are an expert resume analyst, ATS (applicant tracking \
    system) specialist and career coach. The attached document is the candidate's resume.";

/// Closing instruction that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text before or after the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies. \
    The response must start with { and end with }.";
