pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::ai::handlers as ai;
use crate::editor::handlers as editor;
use crate::resume::handlers as resumes;
use crate::state::AppState;

/// Room for a maximum-size photo plus the resume JSON and multipart framing.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route(
            "/api/v1/resumes",
            post(resumes::handle_save_resume).get(resumes::handle_list_resumes),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        // Editor sessions
        .route("/api/v1/editor/sessions", post(editor::handle_open_session))
        .route(
            "/api/v1/editor/sessions/:sid",
            get(editor::handle_get_session).delete(editor::handle_close_session),
        )
        .route(
            "/api/v1/editor/sessions/:sid/document",
            put(editor::handle_update_document),
        )
        .route(
            "/api/v1/editor/sessions/:sid/photo",
            put(editor::handle_select_photo).delete(editor::handle_remove_photo),
        )
        .route(
            "/api/v1/editor/sessions/:sid/retry",
            post(editor::handle_retry),
        )
        // AI writing tools
        .route("/api/v1/ai/summary", post(ai::handle_generate_summary))
        .route(
            "/api/v1/ai/work-experience",
            post(ai::handle_generate_work_experience),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::USER_ID_HEADER;
    use crate::editor::session::EditorSessions;
    use crate::llm_client::{LlmError, TextCompletion};
    use crate::resume::document::ResumeContent;
    use crate::resume::entitlement::SubscriptionLevel;
    use crate::resume::gateway::testing::{harness, Harness};

    struct Unreachable;

    #[async_trait]
    impl TextCompletion for Unreachable {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyContent)
        }
    }

    fn app(h: &Harness) -> Router {
        build_router(AppState {
            store: h.store.clone(),
            gateway: h.gateway.clone(),
            subscriptions: h.level.clone(),
            sessions: EditorSessions::new(h.gateway.clone(), Duration::from_millis(1500)),
            llm: Arc::new(Unreachable),
        })
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let h = harness(SubscriptionLevel::Free);
        let response = app(&h)
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "resume-api");
    }

    #[tokio::test]
    async fn test_requests_without_user_are_unauthorized() {
        let h = harness(SubscriptionLevel::Free);
        let response = app(&h)
            .oneshot(request("GET", "/api/v1/resumes", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_list_reports_quota() {
        let h = harness(SubscriptionLevel::Free);
        for i in 0..3 {
            h.store.insert(
                "user_1",
                ResumeContent {
                    title: Some(format!("cv {i}")),
                    ..Default::default()
                },
                None,
            );
        }

        let response = app(&h)
            .oneshot(request("GET", "/api/v1/resumes", Some("user_1"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["can_create"], false);
        assert_eq!(body["subscription_level"], "free");
    }

    #[tokio::test]
    async fn test_open_session_and_read_it_back() {
        let h = harness(SubscriptionLevel::Free);
        let app = app(&h);

        let response = app
            .clone()
            .oneshot(request("POST", "/api/v1/editor/sessions", Some("user_1"), Some("{}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["status"]["state"], "idle");
        let sid = body["session_id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/editor/sessions/{sid}");
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some("user_2"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("GET", &uri, Some("user_1"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_color_is_rejected() {
        let h = harness(SubscriptionLevel::Pro);
        let app = app(&h);
        let response = app
            .clone()
            .oneshot(request("POST", "/api/v1/editor/sessions", Some("user_1"), Some("{}")))
            .await
            .unwrap();
        let sid = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(request(
                "PUT",
                &format!("/api/v1/editor/sessions/{sid}/document"),
                Some("user_1"),
                Some(r#"{"color_hex":"red"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_tools_need_paid_level() {
        let h = harness(SubscriptionLevel::Free);
        let response = app(&h)
            .oneshot(request("POST", "/api/v1/ai/summary", Some("user_1"), Some("{}")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "AI_TOOLS_NOT_ALLOWED");
        assert_eq!(body["error"]["upgrade_required"], true);
    }
}
