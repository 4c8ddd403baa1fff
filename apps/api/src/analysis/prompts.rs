// All LLM prompt constants for the analysis pipeline.
// Each stage pairs a JSON-discipline system prompt with a template whose
// `{placeholder}` slots are filled from the prior stage's recorded output.

/// System prompt for work-experience extraction — enforces JSON-only output.
pub const WORK_EXTRACTION_SYSTEM: &str =
    "You are an expert resume analyst extracting structured work history. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Omit any field the resume does not state rather than guessing.";

/// Work extraction prompt template. Replace `{resume_text}` before sending.
pub const WORK_EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract work experiences from the resume text below. Include company, role, start date (YYYY-MM), end date (YYYY-MM or "Present"), and description for each experience.

Return a JSON object with this EXACT schema (every field optional, no extra fields):
{
  "work_experiences": [
    {
      "company": "TechCorp",
      "role": "Software Engineer",
      "start_date": "2020-01",
      "end_date": "2023-06",
      "description": "Developed web applications"
    }
  ]
}

Resume:
{resume_text}"#;

/// System prompt for education extraction — enforces JSON-only output.
pub const EDUCATION_EXTRACTION_SYSTEM: &str =
    "You are an expert resume analyst extracting education history. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Omit any field the resume does not state rather than guessing.";

/// Education extraction prompt template. Replace `{resume_text}` before sending.
pub const EDUCATION_EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract educational experiences from this resume, returning institution, degree, field, start year, and end year for each.

Return a JSON object with this EXACT schema (every field optional, no extra fields):
{
  "edu_experiences": [
    {
      "institution": "State University",
      "degree": "B.S.",
      "field": "Computer Science",
      "start_year": 2016,
      "end_year": 2020
    }
  ]
}

Resume:
{resume_text}"#;

/// System prompt for summarization — plain prose, no JSON.
pub const SUMMARY_SYSTEM: &str =
    "You are an expert recruiter writing a short narrative summary of a \
    candidate from their extracted work and education history. \
    Write flowing prose, two to four sentences. \
    Mention the companies and institutions by name. \
    Do NOT invent facts not present in the input.";

/// Summarization prompt template. Replace `{work}` and `{education}`.
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Generate a summary of the following work experience and education:
Work experience: {work}
Education: {education}"#;

/// System prompt for insight extraction — enforces JSON-only output.
pub const INSIGHT_SYSTEM: &str =
    "You are an expert talent analyst distilling a candidate summary into \
    short insight statements covering technical topics and soft skills. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Insight extraction prompt template. Replace `{summary}`.
pub const INSIGHT_PROMPT_TEMPLATE: &str = r#"Extract concise resume insights from the following summary or structured resume data.
Return the insights in the following format with technical topics and soft skills:
{
  "insights": [
    "example insight 1",
    "example insight 2"
  ]
}

Input:
{summary}"#;

/// System prompt for question generation — enforces JSON-array-only output.
pub const QUESTION_SYSTEM: &str =
    "You are an experienced interviewer preparing tailored questions from \
    candidate insights. \
    You MUST respond with a valid JSON array of strings only. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences.";

/// Question generation prompt template. Replace `{insights}`.
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"Based on the following resume insights, generate a list of tailored interview questions:
Resume Insights:
{insights}

Return only the questions as a JSON array of strings."#;
