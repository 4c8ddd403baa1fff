use crate::analysis::pipeline::Pipeline;
use crate::session::store::SessionStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. The pipeline owns the generator and summary cache; the
/// session store is shared with it so handlers can read session state
/// directly.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub sessions: SessionStore,
}
