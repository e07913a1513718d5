use std::sync::Arc;

use crate::billing::subscription::SubscriptionLookup;
use crate::editor::session::EditorSessions;
use crate::llm_client::TextCompletion;
use crate::resume::gateway::ResumeGateway;
use crate::resume::store::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read side of resume storage (listing, hydration).
    pub store: Arc<dyn ResumeStore>,
    /// The only write path for resumes.
    pub gateway: Arc<ResumeGateway>,
    pub subscriptions: Arc<dyn SubscriptionLookup>,
    pub sessions: EditorSessions,
    pub llm: Arc<dyn TextCompletion>,
}
