//! Axum route handlers for the analysis API.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::validation::validate_resume_text;
use crate::errors::AppError;
use crate::session::{NextQuestion, SessionView};
use crate::state::AppState;
use crate::streaming::Emitter;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResumeFromInsightsRequest {
    /// Optional override: when present, question generation uses this text
    /// instead of the session's recorded insights.
    #[serde(default)]
    pub insights: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResumeFromInsightsResponse {
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum NextQuestionResponse {
    Question { question: String },
    NoMore { message: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Validates the resume text, creates a session, and runs the pipeline in a
/// background task while the response streams the summary and a first
/// question as they become available. The session id is returned in the
/// `x-session-id` header so the client can paginate questions afterwards.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, AppError> {
    validate_resume_text(&request.resume_text)?;

    let session_id = state.sessions.create();
    let (emitter, rx) = Emitter::channel();
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.run(session_id, request.resume_text, emitter).await {
            tracing::error!("Pipeline run failed for session {session_id}: {e}");
        }
    });

    let body = Body::from_stream(rx.map(Ok::<_, std::convert::Infallible>));
    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("x-session-id", session_id.to_string())
        .body(body)
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to build streaming response: {e}"))
        })
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.get(session_id)?))
}

/// GET /api/v1/sessions/:id/next-question
///
/// Consuming read: returns the question at the pagination cursor and
/// advances it. Past the end of the list this permanently reports that no
/// more questions are available.
pub async fn handle_next_question(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<NextQuestionResponse>, AppError> {
    let response = match state.sessions.next_question(session_id)? {
        NextQuestion::Question(question) => NextQuestionResponse::Question { question },
        NextQuestion::NoMore => NextQuestionResponse::NoMore {
            message: "No more questions available".to_string(),
        },
    };
    Ok(Json(response))
}

/// POST /api/v1/sessions/:id/resume
///
/// Re-enters the pipeline at the question stage with the supplied insights
/// (or the session's recorded ones) and returns the fresh question list.
pub async fn handle_resume(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ResumeFromInsightsRequest>,
) -> Result<Json<ResumeFromInsightsResponse>, AppError> {
    let questions = state
        .pipeline
        .resume_questions(session_id, request.insights)
        .await?;
    Ok(Json(ResumeFromInsightsResponse { questions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::analysis::pipeline::Pipeline;
    use crate::analysis::summarize::SummaryCache;
    use crate::config::{Config, SummaryDelivery};
    use crate::llm_client::{LlmError, TextChunkStream, TextGenerator};
    use crate::session::store::SessionStore;

    /// Counts generator invocations; the validation tests assert it stays 0.
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("{}".to_string())
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<TextChunkStream, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::EmptyContent)
        }
    }

    fn test_state() -> (AppState, Arc<CountingGenerator>) {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
        });
        let sessions = SessionStore::new();
        let config = Config {
            anthropic_api_key: "test-key".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            summary_cache_cap: 8,
            stream_chunk_chars: 50,
            stream_pace_ms: 0,
            summary_delivery: SummaryDelivery::Sliced,
        };
        let pipeline = Pipeline::new(
            generator.clone(),
            sessions.clone(),
            Arc::new(SummaryCache::new(config.summary_cache_cap)),
            &config,
        );
        (AppState { pipeline, sessions }, generator)
    }

    #[tokio::test]
    async fn test_analyze_rejects_invalid_resume_before_any_generation() {
        let (state, generator) = test_state();
        let request = AnalyzeRequest {
            resume_text: "just some text with no education section".to_string(),
        };

        let result = handle_analyze(State(state), Json(request)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_response_carries_session_header() {
        let (state, _generator) = test_state();
        let request = AnalyzeRequest {
            resume_text:
                "Work Experience:\n- Engineer, Acme, 2020-2023: Built things.\nEducation:\n- B.S., State U, 2016-2020"
                    .to_string(),
        };

        let response = handle_analyze(State(state.clone()), Json(request))
            .await
            .unwrap();
        let header = response
            .headers()
            .get("x-session-id")
            .expect("session header present");
        let session_id: Uuid = header.to_str().unwrap().parse().unwrap();
        assert!(state.sessions.get(session_id).is_ok());
    }

    #[tokio::test]
    async fn test_next_question_unknown_session_is_not_found() {
        let (state, _generator) = test_state();
        let result = handle_next_question(State(state), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_next_question_response_shapes() {
        let (state, _generator) = test_state();
        let session_id = state.sessions.create();
        state
            .sessions
            .append(
                session_id,
                crate::session::StageOutput::Questions(vec!["q0".to_string()]),
            )
            .unwrap();

        let Json(first) = handle_next_question(State(state.clone()), Path(session_id))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(first).unwrap(),
            serde_json::json!({"question": "q0"})
        );

        let Json(done) = handle_next_question(State(state), Path(session_id))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(done).unwrap(),
            serde_json::json!({"message": "No more questions available"})
        );
    }
}
