//! Pipeline engine — orchestrates the five-stage analysis sequence.
//!
//! Flow: work extraction → education extraction → summarization → insight
//! extraction → question generation. Stages run strictly in order: each
//! stage's prompt is built from the exact output recorded by its
//! predecessor, so no stage starts before the prior output is in the
//! session store.
//!
//! Failures are contained per stage: a failed generator call or unparseable
//! output degrades to an empty/placeholder result and the pipeline keeps
//! going. Only validation and unknown-session errors surface to clients.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::extract::{extract_education, extract_work, render_education, render_work};
use crate::analysis::insights::extract_insights;
use crate::analysis::questions::generate_questions;
use crate::analysis::summarize::{summarize, SummaryCache, SummaryOutcome};
use crate::config::{Config, SummaryDelivery};
use crate::errors::AppError;
use crate::llm_client::TextGenerator;
use crate::session::store::SessionStore;
use crate::session::StageOutput;
use crate::streaming::{slice_chunks, Emitter};

const SUMMARY_PREFIX: &str = "Summary: ";
const FIRST_QUESTION_PREFIX: &str = "\nFirst interview question: ";

#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    sessions: SessionStore,
    summary_cache: Arc<SummaryCache>,
    delivery: SummaryDelivery,
    chunk_chars: usize,
    pace: Duration,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sessions: SessionStore,
        summary_cache: Arc<SummaryCache>,
        config: &Config,
    ) -> Self {
        Self {
            generator,
            sessions,
            summary_cache,
            delivery: config.summary_delivery,
            chunk_chars: config.stream_chunk_chars,
            pace: Duration::from_millis(config.stream_pace_ms),
        }
    }

    /// Runs all five stages against an already-validated resume text,
    /// recording each stage's output before the next begins and streaming
    /// the summary and a first-question preview through `emitter`.
    ///
    /// A disconnected client stops the run at the next stage boundary;
    /// whatever stages completed stay recorded.
    pub async fn run(
        &self,
        session_id: Uuid,
        resume_text: String,
        mut emitter: Emitter,
    ) -> Result<(), AppError> {
        // Stage 1: work extraction
        let work = match extract_work(self.generator.as_ref(), &resume_text).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Work extraction failed for session {session_id}: {e}");
                Vec::new()
            }
        };
        let work_text = render_work(&work);
        info!("[work] {work_text}");
        self.sessions.append(session_id, StageOutput::Work(work))?;
        if self.client_gone(&emitter, session_id, "education") {
            return Ok(());
        }

        // Stage 2: education extraction
        let (education, education_text) =
            match extract_education(self.generator.as_ref(), &resume_text).await {
                Ok(entries) => {
                    let text = render_education(&entries);
                    (entries, text)
                }
                Err(e) => {
                    warn!("Education extraction failed for session {session_id}: {e}");
                    (Vec::new(), "No education data extracted".to_string())
                }
            };
        info!("[education] {education_text}");
        self.sessions
            .append(session_id, StageOutput::Education(education))?;
        if self.client_gone(&emitter, session_id, "summary") {
            return Ok(());
        }

        // Stage 3: summarization. The prefix goes out first so incremental
        // deltas land after it.
        if !emitter.send(SUMMARY_PREFIX).await {
            warn!("Client disconnected; abandoning session {session_id} before summary stage");
            return Ok(());
        }
        let summary = self
            .summarize_stage(&mut emitter, session_id, &work_text, &education_text)
            .await;
        info!("[summary] {summary}");
        self.sessions
            .append(session_id, StageOutput::Summary(summary.clone()))?;

        // Stage 4: insight extraction
        let insights = match extract_insights(self.generator.as_ref(), &summary).await {
            Ok(list) => list,
            Err(e) => {
                warn!("Insight extraction failed for session {session_id}: {e}");
                Vec::new()
            }
        };
        let insights_text = if insights.is_empty() {
            "No insights extracted".to_string()
        } else {
            insights.join("\n")
        };
        info!("[insights] {insights_text}");
        self.sessions
            .append(session_id, StageOutput::Insights(insights))?;
        if self.client_gone(&emitter, session_id, "questions") {
            return Ok(());
        }

        // Stage 5: question generation
        let questions = match generate_questions(self.generator.as_ref(), &insights_text).await {
            Ok(list) => list,
            Err(e) => {
                warn!("Question generation failed for session {session_id}: {e}");
                Vec::new()
            }
        };
        info!("[questions] {} generated", questions.len());
        self.sessions
            .append(session_id, StageOutput::Questions(questions))?;

        // Preview of index 0 — a copy, not a consuming read; pagination
        // still starts at the first question.
        if let Some(question) = self.sessions.first_question(session_id)? {
            emitter
                .send(&format!("{FIRST_QUESTION_PREFIX}{question}"))
                .await;
        }

        info!("Pipeline complete for session {session_id}");
        Ok(())
    }

    /// Re-enters the pipeline at the question stage. Input is the override
    /// text when supplied, otherwise the session's recorded insights.
    /// Earlier stages do not re-run; the fresh question list is appended to
    /// the session (resetting its pagination cursor) and returned.
    pub async fn resume_questions(
        &self,
        session_id: Uuid,
        override_insights: Option<String>,
    ) -> Result<Vec<String>, AppError> {
        // Unknown sessions fail before any generator call.
        self.sessions.get(session_id)?;

        let insights_text = match override_insights.filter(|text| !text.trim().is_empty()) {
            Some(text) => text,
            None => self
                .sessions
                .latest_insights_text(session_id)?
                .ok_or_else(|| {
                    AppError::Validation(
                        "Session has no recorded insights; supply insights to resume".to_string(),
                    )
                })?,
        };

        info!("Resuming question generation for session {session_id}");
        let questions = match generate_questions(self.generator.as_ref(), &insights_text).await {
            Ok(list) => list,
            Err(e) => {
                warn!("Question generation failed on resume for session {session_id}: {e}");
                Vec::new()
            }
        };

        self.sessions
            .append(session_id, StageOutput::Questions(questions.clone()))?;
        Ok(questions)
    }

    async fn summarize_stage(
        &self,
        emitter: &mut Emitter,
        session_id: Uuid,
        work_text: &str,
        education_text: &str,
    ) -> String {
        let forward = match self.delivery {
            SummaryDelivery::Incremental => Some(&mut *emitter),
            SummaryDelivery::Sliced => None,
        };
        let outcome = summarize(
            self.generator.as_ref(),
            &self.summary_cache,
            work_text,
            education_text,
            forward,
        )
        .await;

        match outcome {
            Ok(SummaryOutcome {
                text,
                streamed_to_client: true,
                ..
            }) => text,
            Ok(SummaryOutcome { text, .. }) => {
                self.emit_sliced(emitter, &text).await;
                text
            }
            Err(e) => {
                warn!("Summarization failed for session {session_id}: {e}");
                let text = "No summary available".to_string();
                self.emit_sliced(emitter, &text).await;
                text
            }
        }
    }

    /// Emits text in fixed-size character slices with pacing between them.
    async fn emit_sliced(&self, emitter: &mut Emitter, text: &str) {
        for slice in slice_chunks(text, self.chunk_chars) {
            if !emitter.send(&slice).await {
                return;
            }
            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }
    }

    fn client_gone(&self, emitter: &Emitter, session_id: Uuid, next_stage: &str) -> bool {
        if emitter.is_closed() {
            warn!(
                "Client disconnected; abandoning session {session_id} before {next_stage} stage"
            );
            true
        } else {
            false
        }
    }
}
