//! Debounced autosave for one editing session.
//!
//! Each session runs a single actor task that owns the live document and the
//! last saved snapshot. Edits arrive over one channel and re-arm a quiet
//! period timer; when the timer fires and the document is dirty, the actor
//! hands the document to the persister. At most one save is in flight at a
//! time, and quiet-period expiries that land during a save are dropped.
//!
//! ```text
//!   edit ──► PendingDebounce ──quiet period──► Syncing ──ok──► Idle
//!                ▲                               │
//!                └──────── edit / retry ◄── Errored ◄──err──┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, SaveError, SaveErrorReport};
use crate::resume::change::{is_dirty, save_request};
use crate::resume::document::{PhotoRef, ResumeContent, ResumeDocument};
use crate::resume::gateway::{ResumePersister, SavedResume};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    PendingDebounce,
    Syncing,
    Errored,
}

/// Snapshot of a session published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Assigned by the first successful save; stable afterwards.
    pub resume_id: Option<Uuid>,
    pub is_saving: bool,
    pub has_unsaved_changes: bool,
    pub last_error: Option<SaveErrorReport>,
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// A single mutation of the live document.
#[derive(Debug, Clone)]
pub enum Edit {
    Content(ResumeContent),
    Photo(PhotoRef),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("editor session is closed")]
    Closed,

    #[error("there is no failed save to retry")]
    NothingToRetry,

    #[error("last save was rejected and cannot be retried: {0}")]
    NotRetryable(SaveError),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Closed => AppError::NotFound("Editor session is closed".into()),
            SessionError::NothingToRetry => AppError::Conflict(e.to_string()),
            SessionError::NotRetryable(save) => AppError::from(save),
        }
    }
}

enum Command {
    Edit(Edit, oneshot::Sender<SyncStatus>),
    Retry(oneshot::Sender<Result<SyncStatus, SessionError>>),
    Document(oneshot::Sender<ResumeDocument>),
}

/// Cloneable handle to a running autosave actor. The actor stops once every
/// handle is dropped, after letting an in-flight save finish.
#[derive(Clone)]
pub struct AutosaveHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SyncStatus>,
}

impl AutosaveHandle {
    /// Applies an edit and returns the status right after it was applied.
    pub async fn edit(&self, edit: Edit) -> Result<SyncStatus, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Edit(edit, tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Manual retry after an upstream failure.
    pub async fn retry(&self) -> Result<SyncStatus, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Retry(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn document(&self) -> Result<ResumeDocument, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Document(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }
}

struct InFlight {
    sent: ResumeDocument,
    task: JoinHandle<Result<SavedResume, SaveError>>,
}

struct AutosaveActor {
    user_id: String,
    persister: Arc<dyn ResumePersister>,
    quiet_period: Duration,
    document: ResumeDocument,
    snapshot: ResumeDocument,
    deadline: Option<Instant>,
    in_flight: Option<InFlight>,
    last_error: Option<SaveError>,
    last_saved_at: Option<DateTime<Utc>>,
    status: watch::Sender<SyncStatus>,
}

/// Starts an autosave actor for `document`, which is taken to be the saved
/// state (new and empty, or freshly loaded from storage).
pub fn spawn(
    user_id: String,
    document: ResumeDocument,
    persister: Arc<dyn ResumePersister>,
    quiet_period: Duration,
) -> AutosaveHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let initial = SyncStatus {
        state: SyncState::Idle,
        resume_id: document.id,
        is_saving: false,
        has_unsaved_changes: false,
        last_error: None,
        last_saved_at: None,
    };
    let (status_tx, status_rx) = watch::channel(initial);

    let actor = AutosaveActor {
        user_id,
        persister,
        quiet_period,
        snapshot: document.clone(),
        document,
        deadline: None,
        in_flight: None,
        last_error: None,
        last_saved_at: None,
        status: status_tx,
    };
    tokio::spawn(actor.run(commands_rx));

    AutosaveHandle {
        commands: commands_tx,
        status: status_rx,
    }
}

async fn quiet_period_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn save_finished(
    in_flight: Option<&mut InFlight>,
) -> Result<Result<SavedResume, SaveError>, JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.task).await,
        None => std::future::pending().await,
    }
}

impl AutosaveActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = quiet_period_elapsed(self.deadline) => {
                    self.deadline = None;
                    self.on_quiet_period();
                }
                joined = save_finished(self.in_flight.as_mut()) => {
                    self.on_save_finished(joined);
                }
            }
            self.publish();
        }

        // No cancellation: a save already sent is allowed to land.
        if let Some(flight) = self.in_flight.as_mut() {
            let joined = (&mut flight.task).await;
            self.on_save_finished(joined);
            self.publish();
        }
        debug!("Autosave for resume {:?} stopped", self.document.id);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Edit(edit, reply) => {
                self.apply(edit);
                let _ = reply.send(self.publish());
            }
            Command::Retry(reply) => {
                let result = self.retry().map(|()| self.publish());
                let _ = reply.send(result);
            }
            Command::Document(reply) => {
                let _ = reply.send(self.document.clone());
            }
        }
    }

    fn apply(&mut self, edit: Edit) {
        match edit {
            Edit::Content(content) => self.document.content = content,
            Edit::Photo(PhotoRef::Remove)
                if !matches!(self.snapshot.photo, PhotoRef::Stored { .. }) =>
            {
                // Nothing stored to delete; dropping an unsaved pick is enough.
                self.document.photo = PhotoRef::Absent;
            }
            Edit::Photo(photo) => self.document.photo = photo,
        }
        if let Some(error) = self.last_error.take() {
            debug!("Edit cleared previous save error: {error}");
        }
        self.deadline = Some(Instant::now() + self.quiet_period);
    }

    fn retry(&mut self) -> Result<(), SessionError> {
        match &self.last_error {
            None => Err(SessionError::NothingToRetry),
            Some(error) if !error.is_retryable() => Err(SessionError::NotRetryable(error.clone())),
            Some(_) => {
                self.last_error = None;
                if self.in_flight.is_none() && is_dirty(&self.document, &self.snapshot) {
                    self.start_save();
                }
                Ok(())
            }
        }
    }

    fn on_quiet_period(&mut self) {
        if self.in_flight.is_some() {
            debug!("Quiet period elapsed during a save; dropped");
            return;
        }
        if self.last_error.is_some() {
            return;
        }
        if is_dirty(&self.document, &self.snapshot) {
            self.start_save();
        }
    }

    fn start_save(&mut self) {
        let request = save_request(&self.document, &self.snapshot);
        let sent = self.document.clone();
        let persister = self.persister.clone();
        let user_id = self.user_id.clone();

        debug!("Saving resume {:?}", sent.id);
        let task = tokio::spawn(async move { persister.persist(&user_id, request).await });
        self.in_flight = Some(InFlight { sent, task });
    }

    fn on_save_finished(&mut self, joined: Result<Result<SavedResume, SaveError>, JoinError>) {
        let Some(InFlight { sent, .. }) = self.in_flight.take() else {
            return;
        };
        let result = joined
            .unwrap_or_else(|e| Err(SaveError::Upstream(format!("save task failed: {e}"))));

        match result {
            Ok(saved) => self.adopt(sent, saved),
            Err(error) => {
                warn!("Autosave for resume {:?} failed: {error}", sent.id);
                self.last_error = Some(error);
            }
        }
    }

    fn adopt(&mut self, sent: ResumeDocument, saved: SavedResume) {
        let settled_photo = sent.photo.settled(saved.photo_url.as_deref());
        if self.document.photo == sent.photo {
            self.document.photo = settled_photo.clone();
        }

        if self.document.id != Some(saved.id) {
            info!("Editor session adopted resume id {}", saved.id);
            self.document.id = Some(saved.id);
        }

        // The snapshot is what was sent, not what is live now: edits made
        // during the save stay dirty.
        self.snapshot = ResumeDocument {
            id: Some(saved.id),
            content: sent.content,
            photo: settled_photo,
        };
        self.last_saved_at = Some(Utc::now());

        // A quiet period that elapsed during the save was dropped; pick the
        // remaining changes up now unless the user is still typing.
        if self.deadline.is_none() && is_dirty(&self.document, &self.snapshot) {
            self.start_save();
        }
    }

    fn state(&self) -> SyncState {
        if self.in_flight.is_some() {
            SyncState::Syncing
        } else if self.last_error.is_some() {
            SyncState::Errored
        } else if self.deadline.is_some() {
            SyncState::PendingDebounce
        } else {
            SyncState::Idle
        }
    }

    fn publish(&self) -> SyncStatus {
        let status = SyncStatus {
            state: self.state(),
            resume_id: self.document.id,
            is_saving: self.in_flight.is_some(),
            has_unsaved_changes: is_dirty(&self.document, &self.snapshot),
            last_error: self.last_error.as_ref().map(SaveErrorReport::from),
            last_saved_at: self.last_saved_at,
        };
        self.status.send_replace(status.clone());
        status
    }
}
