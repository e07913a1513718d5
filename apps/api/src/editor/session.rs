//! Registry of open editor sessions, one autosave actor per session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::editor::autosave::{self, AutosaveHandle};
use crate::errors::AppError;
use crate::resume::document::ResumeDocument;
use crate::resume::gateway::ResumePersister;

pub struct EditorSession {
    pub id: Uuid,
    pub user_id: String,
    pub autosave: AutosaveHandle,
    last_used: std::sync::Mutex<Instant>,
}

impl EditorSession {
    fn touch(&self) {
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .map(|last_used| last_used.elapsed())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct EditorSessions {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<EditorSession>>>>,
    persister: Arc<dyn ResumePersister>,
    quiet_period: Duration,
}

impl EditorSessions {
    pub fn new(persister: Arc<dyn ResumePersister>, quiet_period: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            persister,
            quiet_period,
        }
    }

    pub async fn open(&self, user_id: &str, document: ResumeDocument) -> Arc<EditorSession> {
        let autosave = autosave::spawn(
            user_id.to_string(),
            document,
            self.persister.clone(),
            self.quiet_period,
        );
        let session = Arc::new(EditorSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            autosave,
            last_used: std::sync::Mutex::new(Instant::now()),
        });

        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        info!("Opened editor session {} for user {}", session.id, user_id);
        session
    }

    /// Looks up a session owned by `user_id`. Sessions of other users are
    /// reported as missing.
    pub async fn get(&self, id: Uuid, user_id: &str) -> Result<Arc<EditorSession>, AppError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Editor session {id} not found")))?;
        session.touch();
        Ok(session)
    }

    pub async fn close(&self, id: Uuid, user_id: &str) -> Result<Arc<EditorSession>, AppError> {
        let mut sessions = self.sessions.write().await;
        let owned = sessions.get(&id).is_some_and(|s| s.user_id == user_id);
        if !owned {
            return Err(AppError::NotFound(format!("Editor session {id} not found")));
        }
        let session = sessions
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Editor session {id} not found")))?;
        info!("Closed editor session {id}");
        Ok(session)
    }

    /// Drops sessions unused for longer than `idle`. Returns how many went.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for() < idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
