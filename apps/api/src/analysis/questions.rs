//! Question stage — turns candidate insights into tailored interview
//! questions.

use tracing::warn;

use crate::analysis::insights::fallback_lines;
use crate::analysis::prompts::{QUESTION_PROMPT_TEMPLATE, QUESTION_SYSTEM};
use crate::llm_client::{parse_structured, LlmError, TextGenerator};

/// Generates interview questions from the joined insights text. Output that
/// is not a JSON array degrades to one question per non-empty line; a single
/// unstructured blob becomes a single question.
pub async fn generate_questions(
    generator: &dyn TextGenerator,
    insights_text: &str,
) -> Result<Vec<String>, LlmError> {
    let prompt = QUESTION_PROMPT_TEMPLATE.replace("{insights}", insights_text);
    let raw = generator.generate(&prompt, QUESTION_SYSTEM).await?;

    match parse_structured::<Vec<String>>(&raw) {
        Ok(questions) => Ok(questions),
        Err(e) => {
            warn!("Question output was not a JSON array ({e}); falling back to raw lines");
            Ok(fallback_lines(&raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::TextChunkStream;
    use async_trait::async_trait;
    use futures::StreamExt;

    struct CannedGenerator {
        response: String,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<TextChunkStream, LlmError> {
            let chunks = vec![Ok(self.response.clone())];
            Ok(futures::stream::iter(chunks).boxed())
        }
    }

    #[tokio::test]
    async fn test_json_array_output_parses() {
        let generator = CannedGenerator {
            response: r#"["Tell me about Acme?", "Why Rust?"]"#.to_string(),
        };
        let questions = generate_questions(&generator, "insights").await.unwrap();
        assert_eq!(questions, vec!["Tell me about Acme?", "Why Rust?"]);
    }

    #[tokio::test]
    async fn test_fenced_json_array_output_parses() {
        let generator = CannedGenerator {
            response: "```json\n[\"Q one\", \"Q two\"]\n```".to_string(),
        };
        let questions = generate_questions(&generator, "insights").await.unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn test_unstructured_output_falls_back_to_lines() {
        let generator = CannedGenerator {
            response: "Tell me about Acme?\nWhy Rust?".to_string(),
        };
        let questions = generate_questions(&generator, "insights").await.unwrap();
        assert_eq!(questions, vec!["Tell me about Acme?", "Why Rust?"]);
    }

    #[tokio::test]
    async fn test_single_blob_becomes_single_question() {
        let generator = CannedGenerator {
            response: "Walk me through your proudest project".to_string(),
        };
        let questions = generate_questions(&generator, "insights").await.unwrap();
        assert_eq!(questions.len(), 1);
    }
}
