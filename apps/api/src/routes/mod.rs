pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::intake::handlers::handle_extract;
use crate::ledger::handlers::handle_record_hash;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let intake = Router::new()
        .route("/extract", post(handle_extract))
        .route("/api/extract-text", post(handle_extract))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .merge(intake)
        // Auth pass-through
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/logout", post(auth::handle_logout))
        .route("/auth/log-out", post(auth::handle_logout))
        // Document hash registry
        .route("/api/v1/hashes", post(handle_record_hash))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::testing::{body_json, build_test_app, RecordingScorer};

    #[tokio::test]
    async fn test_root_liveness_text() {
        let (app, _root) = build_test_app(RecordingScorer::answering(json!({})));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"API Working !!");
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let (app, _root) = build_test_app(RecordingScorer::answering(json!({})));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = body_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "intake-api");
    }

    #[tokio::test]
    async fn test_extract_rejects_non_multipart() {
        let (app, _root) = build_test_app(RecordingScorer::answering(json!({})));
        let request = Request::builder()
            .method("POST")
            .uri("/extract")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _) = body_json(app, request).await;
        assert!(status.is_client_error());
    }
}
