use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy of a single persistence attempt.
///
/// `Unauthorized`, `QuotaExceeded` and `CustomizationNotAllowed` are policy
/// rejections and are never retried. `Upstream` is the only retryable kind,
/// and only through an explicit user retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SaveError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Resume limit reached for your subscription level")]
    QuotaExceeded,

    #[error("Customizations are not available for your subscription level")]
    CustomizationNotAllowed,

    #[error("Resume {0} not found")]
    NotFound(Uuid),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl SaveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaveError::Upstream(_))
    }

    /// Policy rejections that the client answers with an upgrade prompt.
    pub fn upgrade_required(&self) -> bool {
        matches!(
            self,
            SaveError::QuotaExceeded | SaveError::CustomizationNotAllowed
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            SaveError::Unauthorized => "UNAUTHORIZED",
            SaveError::QuotaExceeded => "QUOTA_EXCEEDED",
            SaveError::CustomizationNotAllowed => "CUSTOMIZATION_NOT_ALLOWED",
            SaveError::NotFound(_) => "NOT_FOUND",
            SaveError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }
}

impl From<sqlx::Error> for SaveError {
    fn from(e: sqlx::Error) -> Self {
        SaveError::Upstream(format!("database: {e}"))
    }
}

/// Serializable view of a `SaveError`, published on the editor session status.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaveErrorReport {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    pub upgrade_required: bool,
}

impl From<&SaveError> for SaveErrorReport {
    fn from(e: &SaveError) -> Self {
        SaveErrorReport {
            code: e.code(),
            message: e.to_string(),
            retryable: e.is_retryable(),
            upgrade_required: e.upgrade_required(),
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Resume limit reached")]
    QuotaExceeded,

    #[error("Customizations not allowed")]
    CustomizationNotAllowed,

    #[error("AI tools not allowed")]
    AiToolsNotAllowed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SaveError> for AppError {
    fn from(e: SaveError) -> Self {
        match e {
            SaveError::Unauthorized => AppError::Unauthorized,
            SaveError::QuotaExceeded => AppError::QuotaExceeded,
            SaveError::CustomizationNotAllowed => AppError::CustomizationNotAllowed,
            SaveError::NotFound(id) => AppError::NotFound(format!("Resume {id} not found")),
            SaveError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::QuotaExceeded => (
                StatusCode::PAYMENT_REQUIRED,
                "QUOTA_EXCEEDED",
                "Maximum resume count reached for this subscription level".to_string(),
            ),
            AppError::CustomizationNotAllowed => (
                StatusCode::FORBIDDEN,
                "CUSTOMIZATION_NOT_ALLOWED",
                "Customizations are not available for this subscription level".to_string(),
            ),
            AppError::AiToolsNotAllowed => (
                StatusCode::FORBIDDEN,
                "AI_TOOLS_NOT_ALLOWED",
                "AI tools are not available for this subscription level".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_FAILURE",
                    "An upstream service failed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let upgrade_required = matches!(
            self,
            AppError::QuotaExceeded | AppError::CustomizationNotAllowed | AppError::AiToolsNotAllowed
        );

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "upgrade_required": upgrade_required
            }
        }));

        (status, body).into_response()
    }
}
