use axum::{extract::State, Json};

use crate::ai::tools::{
    generate_summary, generate_work_experience, GenerateWorkExperienceInput, GeneratedSummary,
};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::resume::document::{ResumeContent, WorkExperience};
use crate::state::AppState;

/// POST /api/v1/ai/summary
pub async fn handle_generate_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(content): Json<ResumeContent>,
) -> Result<Json<GeneratedSummary>, AppError> {
    let summary = generate_summary(
        state.llm.as_ref(),
        state.subscriptions.as_ref(),
        &user_id,
        &content,
    )
    .await?;
    Ok(Json(summary))
}

/// POST /api/v1/ai/work-experience
pub async fn handle_generate_work_experience(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<GenerateWorkExperienceInput>,
) -> Result<Json<WorkExperience>, AppError> {
    let entry = generate_work_experience(
        state.llm.as_ref(),
        state.subscriptions.as_ref(),
        &user_id,
        &input,
    )
    .await?;
    Ok(Json(entry))
}
