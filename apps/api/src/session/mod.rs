//! Session state for one resume-analysis run.
//!
//! Every pipeline stage writes its output here under a named field — stage
//! output is never addressed by positional offset into a shared message list.
//! Histories are append-only: re-running a stage appends a new run, it never
//! edits a previous one. The latest run is the active value.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One extracted work-experience entry. Every field is optional — the source
/// text may lack any of them, and downstream rendering substitutes "Unknown".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkExperience {
    pub company: Option<String>,
    pub role: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
}

/// One extracted education entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationRecord {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Tagged union of one pipeline stage's output.
#[derive(Debug, Clone)]
pub enum StageOutput {
    Work(Vec<WorkExperience>),
    Education(Vec<EducationRecord>),
    Summary(String),
    Insights(Vec<String>),
    Questions(Vec<String>),
}

impl StageOutput {
    /// Stage name used in logs.
    pub fn stage_name(&self) -> &'static str {
        match self {
            StageOutput::Work(_) => "work",
            StageOutput::Education(_) => "education",
            StageOutput::Summary(_) => "summary",
            StageOutput::Insights(_) => "insights",
            StageOutput::Questions(_) => "questions",
        }
    }
}

/// Result of a consuming next-question read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextQuestion {
    Question(String),
    NoMore,
}

/// The accumulated state of one resume analysis, addressed by `session_id`.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    work_runs: Vec<Vec<WorkExperience>>,
    education_runs: Vec<Vec<EducationRecord>>,
    summary_runs: Vec<String>,
    insight_runs: Vec<Vec<String>>,
    question_runs: Vec<Vec<String>>,
    /// Index into the latest question run; advanced only by `next_question`.
    cursor: usize,
}

impl Session {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            work_runs: Vec::new(),
            education_runs: Vec::new(),
            summary_runs: Vec::new(),
            insight_runs: Vec::new(),
            question_runs: Vec::new(),
            cursor: 0,
        }
    }

    /// Appends a stage output to its history. A new question run starts
    /// unread, so the pagination cursor resets.
    pub fn record(&mut self, output: StageOutput) {
        match output {
            StageOutput::Work(entries) => self.work_runs.push(entries),
            StageOutput::Education(entries) => self.education_runs.push(entries),
            StageOutput::Summary(text) => self.summary_runs.push(text),
            StageOutput::Insights(insights) => self.insight_runs.push(insights),
            StageOutput::Questions(questions) => {
                self.question_runs.push(questions);
                self.cursor = 0;
            }
        }
    }

    pub fn latest_insights(&self) -> Option<&[String]> {
        self.insight_runs.last().map(Vec::as_slice)
    }

    /// The active question list (latest run), empty if none generated yet.
    pub fn questions(&self) -> &[String] {
        self.question_runs.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-consuming preview of the first question. Streamed during the
    /// initial run without advancing the cursor.
    pub fn first_question(&self) -> Option<&str> {
        self.questions().first().map(String::as_str)
    }

    /// Returns the question at the cursor and advances it by one. Once the
    /// cursor reaches the end of the list the transition to `NoMore` is
    /// permanent: the cursor is clamped and never wraps.
    pub fn next_question(&mut self) -> NextQuestion {
        let questions = self.question_runs.last().map(Vec::as_slice).unwrap_or(&[]);
        if self.cursor >= questions.len() {
            return NextQuestion::NoMore;
        }
        let question = questions[self.cursor].clone();
        self.cursor += 1;
        NextQuestion::Question(question)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            created_at: self.created_at,
            summary: self.summary_runs.last().cloned(),
            insights: self.insight_runs.last().cloned().unwrap_or_default(),
            work_entry_count: self.work_runs.last().map(Vec::len).unwrap_or(0),
            education_entry_count: self.education_runs.last().map(Vec::len).unwrap_or(0),
            question_count: self.questions().len(),
            cursor: self.cursor,
        }
    }
}

/// Read-only snapshot of a session returned by the session lookup endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub insights: Vec<String>,
    pub work_entry_count: usize,
    pub education_entry_count: usize,
    pub question_count: usize,
    pub cursor: usize,
}
