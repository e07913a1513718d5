use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::resume::document::{ResumeContent, ResumeDocument};
use crate::resume::entitlement::{can_create_resume, SubscriptionLevel};
use crate::resume::gateway::{PhotoUpdate, SaveResumeRequest, SavedResume};
use crate::resume::upload::read_upload_form;
use crate::state::AppState;

/// What to do with the stored photo when no new file is attached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoDirective {
    #[default]
    Keep,
    Remove,
}

/// JSON carried in the `resume` part of a save request.
#[derive(Debug, Deserialize)]
pub struct SaveResumeForm {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub content: ResumeContent,
    #[serde(default)]
    pub photo: PhotoDirective,
}

#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeDocument>,
    pub total_count: usize,
    pub can_create: bool,
    pub subscription_level: SubscriptionLevel,
}

/// POST /api/v1/resumes (multipart: `resume` JSON, optional `photo` file)
pub async fn handle_save_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SavedResume>), AppError> {
    let upload = read_upload_form(multipart).await?;
    let raw = upload
        .resume_json
        .ok_or_else(|| AppError::Validation("missing 'resume' part".into()))?;
    let form: SaveResumeForm = serde_json::from_str(&raw)
        .map_err(|e| AppError::Validation(format!("invalid resume JSON: {e}")))?;
    form.content.validate()?;

    let photo = match (upload.photo, form.photo) {
        (Some(file), _) => PhotoUpdate::Replace(file),
        (None, PhotoDirective::Remove) => PhotoUpdate::Remove,
        (None, PhotoDirective::Keep) => PhotoUpdate::Keep,
    };
    let status = if form.id.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    let saved = state
        .gateway
        .save_resume(
            &user_id,
            SaveResumeRequest {
                id: form.id,
                content: form.content,
                photo,
            },
        )
        .await?;
    Ok((status, Json(saved)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ResumeListResponse>, AppError> {
    let level = state.subscriptions.resolve(&user_id).await?;
    let records = state.store.list_by_owner(&user_id).await?;
    let total_count = records.len();

    Ok(Json(ResumeListResponse {
        can_create: can_create_resume(level, total_count as i64),
        resumes: records.into_iter().map(ResumeDocument::from_record).collect(),
        total_count,
        subscription_level: level,
    }))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDocument>, AppError> {
    let record = state
        .store
        .load_owned(id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(ResumeDocument::from_record(record)))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.gateway.delete_resume(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::document::BorderStyle;

    #[test]
    fn test_save_form_defaults_to_create_and_keep() {
        let form: SaveResumeForm =
            serde_json::from_str(r#"{"title":"Backend CV","skills":["Rust"]}"#).unwrap();
        assert_eq!(form.id, None);
        assert_eq!(form.photo, PhotoDirective::Keep);
        assert_eq!(form.content.title.as_deref(), Some("Backend CV"));
        assert_eq!(form.content.skills, vec!["Rust".to_string()]);
    }

    #[test]
    fn test_save_form_reads_id_styling_and_removal() {
        let id = Uuid::new_v4();
        let raw = format!(
            r##"{{"id":"{id}","photo":"remove","color_hex":"#1A2B3C","border_style":"squircle"}}"##
        );
        let form: SaveResumeForm = serde_json::from_str(&raw).unwrap();
        assert_eq!(form.id, Some(id));
        assert_eq!(form.photo, PhotoDirective::Remove);
        assert_eq!(form.content.border_style, Some(BorderStyle::Squircle));
        assert_eq!(form.content.color_hex.as_deref(), Some("#1A2B3C"));
    }
}
