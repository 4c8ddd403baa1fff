//! Extraction stages — pull structured work and education records out of raw
//! resume text. Pure functions of the text plus one generator call each; the
//! pipeline contains their failures per stage.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::analysis::prompts::{
    EDUCATION_EXTRACTION_PROMPT_TEMPLATE, EDUCATION_EXTRACTION_SYSTEM,
    WORK_EXTRACTION_PROMPT_TEMPLATE, WORK_EXTRACTION_SYSTEM,
};
use crate::llm_client::{parse_structured, LlmError, TextGenerator};
use crate::session::{EducationRecord, WorkExperience};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct WorkExperienceList {
    work_experiences: Vec<WorkExperience>,
}

#[derive(Debug, Deserialize)]
struct EducationList {
    edu_experiences: Vec<EducationRecord>,
}

/// Extracts work experiences from resume text.
pub async fn extract_work(
    generator: &dyn TextGenerator,
    resume_text: &str,
) -> Result<Vec<WorkExperience>, LlmError> {
    let prompt = WORK_EXTRACTION_PROMPT_TEMPLATE.replace("{resume_text}", resume_text);
    let raw = generator.generate(&prompt, WORK_EXTRACTION_SYSTEM).await?;
    let list: WorkExperienceList = parse_structured(&raw)?;
    Ok(list.work_experiences)
}

/// Extracts education records from cleaned resume text.
pub async fn extract_education(
    generator: &dyn TextGenerator,
    resume_text: &str,
) -> Result<Vec<EducationRecord>, LlmError> {
    let cleaned = clean_education_text(resume_text);
    let prompt = EDUCATION_EXTRACTION_PROMPT_TEMPLATE.replace("{resume_text}", &cleaned);
    let raw = generator
        .generate(&prompt, EDUCATION_EXTRACTION_SYSTEM)
        .await?;
    let list: EducationList = parse_structured(&raw)?;
    Ok(list.edu_experiences)
}

/// Drops `#`-prefixed comment lines and collapses whitespace runs before the
/// education extraction prompt is built.
pub fn clean_education_text(resume_text: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let without_comments: String = resume_text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    ws.replace_all(without_comments.trim(), " ").into_owned()
}

/// Renders work entries into the line format consumed by the summary prompt.
/// Missing fields render as "Unknown"; an empty list gets a placeholder.
pub fn render_work(entries: &[WorkExperience]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|job| {
            format!(
                "{} at {} ({} - {}): {}",
                job.role.as_deref().unwrap_or(UNKNOWN),
                job.company.as_deref().unwrap_or(UNKNOWN),
                job.start_date.as_deref().unwrap_or(UNKNOWN),
                job.end_date.as_deref().unwrap_or(UNKNOWN),
                job.description.as_deref().unwrap_or_default(),
            )
        })
        .collect();

    if lines.is_empty() {
        "No work experience extracted".to_string()
    } else {
        lines.join("\n")
    }
}

/// Renders education entries for the summary prompt. Entries missing any of
/// degree, institution, or field are skipped; missing years render "Unknown".
pub fn render_education(entries: &[EducationRecord]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .filter(|edu| {
            edu.degree.is_some() && edu.institution.is_some() && edu.field.is_some()
        })
        .map(|edu| {
            format!(
                "{} in {} at {} ({} - {})",
                edu.degree.as_deref().unwrap_or(UNKNOWN),
                edu.field.as_deref().unwrap_or(UNKNOWN),
                edu.institution.as_deref().unwrap_or(UNKNOWN),
                edu.start_year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                edu.end_year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            )
        })
        .collect();

    if lines.is_empty() {
        "No valid education entries found".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(role: Option<&str>, company: Option<&str>) -> WorkExperience {
        WorkExperience {
            company: company.map(str::to_string),
            role: role.map(str::to_string),
            start_date: Some("2020".to_string()),
            end_date: Some("2023".to_string()),
            description: Some("Built things.".to_string()),
        }
    }

    #[test]
    fn test_render_work_full_entry() {
        let rendered = render_work(&[work(Some("Engineer"), Some("Acme"))]);
        assert_eq!(rendered, "Engineer at Acme (2020 - 2023): Built things.");
    }

    #[test]
    fn test_render_work_missing_fields_become_unknown() {
        let rendered = render_work(&[work(None, None)]);
        assert!(rendered.starts_with("Unknown at Unknown"));
    }

    #[test]
    fn test_render_work_empty_placeholder() {
        assert_eq!(render_work(&[]), "No work experience extracted");
    }

    #[test]
    fn test_render_education_skips_partial_entries() {
        let entries = vec![
            EducationRecord {
                institution: Some("State U".to_string()),
                degree: Some("B.S.".to_string()),
                field: Some("Computer Science".to_string()),
                start_year: Some(2016),
                end_year: Some(2020),
            },
            EducationRecord {
                institution: Some("Nowhere College".to_string()),
                degree: None,
                field: None,
                start_year: None,
                end_year: None,
            },
        ];
        let rendered = render_education(&entries);
        assert_eq!(
            rendered,
            "B.S. in Computer Science at State U (2016 - 2020)"
        );
    }

    #[test]
    fn test_render_education_missing_years_become_unknown() {
        let entries = vec![EducationRecord {
            institution: Some("State U".to_string()),
            degree: Some("B.S.".to_string()),
            field: Some("Math".to_string()),
            start_year: None,
            end_year: None,
        }];
        assert_eq!(
            render_education(&entries),
            "B.S. in Math at State U (Unknown - Unknown)"
        );
    }

    #[test]
    fn test_render_education_empty_placeholder() {
        assert_eq!(render_education(&[]), "No valid education entries found");
    }

    #[test]
    fn test_clean_education_text_strips_comments_and_whitespace() {
        let text = "# internal note\nEducation:\n- B.S.,   State U,\t2016-2020";
        assert_eq!(
            clean_education_text(text),
            "Education: - B.S., State U, 2016-2020"
        );
    }

    #[test]
    fn test_work_record_deserializes_with_missing_fields() {
        let json = r#"{"work_experiences": [{"company": "Acme"}]}"#;
        let list: WorkExperienceList = serde_json::from_str(json).unwrap();
        assert_eq!(list.work_experiences.len(), 1);
        assert_eq!(list.work_experiences[0].company.as_deref(), Some("Acme"));
        assert!(list.work_experiences[0].role.is_none());
    }

    #[test]
    fn test_education_record_deserializes_with_missing_fields() {
        let json = r#"{"edu_experiences": [{"institution": "State U", "start_year": 2016}]}"#;
        let list: EducationList = serde_json::from_str(json).unwrap();
        assert_eq!(list.edu_experiences[0].start_year, Some(2016));
        assert!(list.edu_experiences[0].degree.is_none());
    }
}
