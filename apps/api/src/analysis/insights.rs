//! Insight stage — distills the summary into short insight statements.

use serde::Deserialize;
use tracing::warn;

use crate::analysis::prompts::{INSIGHT_PROMPT_TEMPLATE, INSIGHT_SYSTEM};
use crate::llm_client::{parse_structured, LlmError, TextGenerator};

#[derive(Debug, Deserialize)]
struct InsightsPayload {
    insights: Vec<String>,
}

/// Extracts insight statements from the candidate summary. Output that is not
/// the requested JSON object degrades to the raw text's non-empty lines
/// instead of failing the stage.
pub async fn extract_insights(
    generator: &dyn TextGenerator,
    summary: &str,
) -> Result<Vec<String>, LlmError> {
    let prompt = INSIGHT_PROMPT_TEMPLATE.replace("{summary}", summary);
    let raw = generator.generate(&prompt, INSIGHT_SYSTEM).await?;

    match parse_structured::<InsightsPayload>(&raw) {
        Ok(payload) => Ok(payload.insights),
        Err(e) => {
            warn!("Insight output was not structured JSON ({e}); falling back to raw lines");
            Ok(fallback_lines(&raw))
        }
    }
}

/// Treats unstructured output as one insight per non-empty line.
pub(crate) fn fallback_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
