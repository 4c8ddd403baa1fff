//! Session store — the in-memory checkpoint map for all analysis runs.
//!
//! One mutex guards the whole map: sessions are only ever advanced by the
//! request that owns them, so structural serialization of the map is the only
//! locking discipline needed. State lives for the process lifetime; there is
//! no eviction and no enumeration of all sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::errors::AppError;
use crate::session::{NextQuestion, Session, SessionView, StageOutput};

/// Mapping from session id to accumulated session state.
/// Cheap to clone; all clones share the same map.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new, empty session and returns its id (a v4 UUID — the
    /// 128-bit random token collisions are treated as negligible).
    pub fn create(&self) -> Uuid {
        let session_id = Uuid::new_v4();
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.insert(session_id, Session::new(session_id));
        session_id
    }

    /// Returns a read-only view of the session, or `NotFound` for unknown ids.
    pub fn get(&self, session_id: Uuid) -> Result<SessionView, AppError> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .get(&session_id)
            .map(Session::view)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
    }

    /// Records one stage's output into the session's append-only history.
    pub fn append(&self, session_id: Uuid, output: StageOutput) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        tracing::debug!(
            "Recording {} output for session {session_id}",
            output.stage_name()
        );
        session.record(output);
        Ok(())
    }

    /// Consuming read: returns the question at the pagination cursor and
    /// advances it. The `NoMore` transition is permanent per session run.
    pub fn next_question(&self, session_id: Uuid) -> Result<NextQuestion, AppError> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        Ok(session.next_question())
    }

    /// Non-consuming preview of the first question in the active run.
    pub fn first_question(&self, session_id: Uuid) -> Result<Option<String>, AppError> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .get(&session_id)
            .map(|s| s.first_question().map(str::to_string))
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
    }

    /// The session's most recent insight list, joined for prompt assembly.
    pub fn latest_insights_text(&self, session_id: Uuid) -> Result<Option<String>, AppError> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        let session = sessions
            .get(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        Ok(session.latest_insights().map(|insights| insights.join("\n")))
    }
}
