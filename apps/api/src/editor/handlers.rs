use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::editor::autosave::{Edit, SyncStatus};
use crate::errors::AppError;
use crate::resume::document::{PhotoRef, ResumeContent, ResumeDocument};
use crate::resume::upload::read_upload_form;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenSessionRequest {
    /// Resume to hydrate from. Omitted for a new, empty resume.
    pub resume_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub status: SyncStatus,
    pub document: ResumeDocument,
}

/// POST /api/v1/editor/sessions
pub async fn handle_open_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let document = match req.resume_id {
        None => ResumeDocument::new(),
        Some(id) => {
            let record = state
                .store
                .load_owned(id, &user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
            ResumeDocument::from_record(record)
        }
    };

    let session = state.sessions.open(&user_id, document.clone()).await;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id,
            status: session.autosave.status(),
            document,
        }),
    ))
}

/// GET /api/v1/editor/sessions/:sid
pub async fn handle_get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(sid, &user_id).await?;
    let document = session.autosave.document().await?;
    Ok(Json(SessionResponse {
        session_id: session.id,
        status: session.autosave.status(),
        document,
    }))
}

/// PUT /api/v1/editor/sessions/:sid/document
pub async fn handle_update_document(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
    Json(content): Json<ResumeContent>,
) -> Result<Json<SyncStatus>, AppError> {
    content.validate()?;
    let session = state.sessions.get(sid, &user_id).await?;
    let status = session.autosave.edit(Edit::Content(content)).await?;
    Ok(Json(status))
}

/// PUT /api/v1/editor/sessions/:sid/photo (multipart: `photo` file)
pub async fn handle_select_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<SyncStatus>, AppError> {
    let session = state.sessions.get(sid, &user_id).await?;
    let photo = read_upload_form(multipart)
        .await?
        .photo
        .ok_or_else(|| AppError::Validation("missing 'photo' file".into()))?;
    let status = session.autosave.edit(Edit::Photo(PhotoRef::Pending(photo))).await?;
    Ok(Json(status))
}

/// DELETE /api/v1/editor/sessions/:sid/photo
pub async fn handle_remove_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
) -> Result<Json<SyncStatus>, AppError> {
    let session = state.sessions.get(sid, &user_id).await?;
    let status = session.autosave.edit(Edit::Photo(PhotoRef::Remove)).await?;
    Ok(Json(status))
}

/// POST /api/v1/editor/sessions/:sid/retry
pub async fn handle_retry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
) -> Result<Json<SyncStatus>, AppError> {
    let session = state.sessions.get(sid, &user_id).await?;
    let status = session.autosave.retry().await?;
    Ok(Json(status))
}

/// DELETE /api/v1/editor/sessions/:sid
///
/// Edits still waiting for the quiet period are discarded. A save already in
/// flight lands first, so the returned status is final.
pub async fn handle_close_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(sid): Path<Uuid>,
) -> Result<Json<SyncStatus>, AppError> {
    let session = state.sessions.close(sid, &user_id).await?;
    let mut updates = session.autosave.subscribe();
    let status = match updates.wait_for(|s| !s.is_saving).await {
        Ok(status) => status.clone(),
        Err(_) => session.autosave.status(),
    };
    Ok(Json(status))
}
