//! Resume-text validation — the gate that runs before any pipeline stage.
//!
//! Text must carry a recognizable education section: an `Education:` header
//! line and at least one `- <degree>, <institution>, <start>-<end>` entry
//! line. Rejection happens before any generator call is made.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::AppError;

fn education_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*Education\s*:").expect("valid regex"))
}

fn education_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*-\s*[^,\n]+,\s*[^,\n]+,\s*\d{4}\s*-\s*\d{4}\s*$")
            .expect("valid regex")
    })
}

/// Validates raw resume text before the pipeline runs.
pub fn validate_resume_text(resume_text: &str) -> Result<(), AppError> {
    if resume_text.trim().is_empty() {
        return Err(AppError::Validation(
            "resume_text cannot be empty".to_string(),
        ));
    }

    if !education_header().is_match(resume_text) {
        return Err(AppError::Validation(
            "Resume text must contain an 'Education:' section".to_string(),
        ));
    }

    if !education_entry().is_match(resume_text) {
        return Err(AppError::Validation(
            "Education section must contain an entry like '- <degree>, <institution>, <start>-<end>'"
                .to_string(),
        ));
    }

    Ok(())
}
