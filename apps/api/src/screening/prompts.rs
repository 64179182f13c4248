// Prompts for the external resume analysis call.

/// Sent with every analysis prompt; the reply goes straight to serde_json.
pub const JSON_ONLY_INSTRUCTION: &str = "Return ONLY valid JSON. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const RESUME_ANALYSIS_TEMPLATE: &str = r#"You are an AI recruiter. Analyze the resume against the job description.
{json_only}
The JSON object must have exactly these keys:
- match_score (integer 0-100)
- missing_skills (list of strings: skills the job requires that the resume lacks)
- feedback (short string with concrete improvements)

Job Description:
{jd_text}

Resume:
{resume_text}
"#;

/// Fills the analysis template.
pub fn resume_analysis_prompt(jd_text: &str, resume_text: &str) -> String {
    RESUME_ANALYSIS_TEMPLATE
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
        .replace("{jd_text}", jd_text)
        .replace("{resume_text}", resume_text)
}
