//! 서비스별 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::detect::{self, DetectState};
use crate::handlers::embed::{self, EmbedState};
use crate::handlers::segment::{self, SegmentState};

/// 검출 서비스 라우트
pub fn detect_routes(state: DetectState) -> Router {
    Router::new()
        .route("/", get(detect::root))
        .route("/health", get(detect::health))
        .route("/detect", post(detect::detect))
        .with_state(state)
}

/// 임베딩 서비스 라우트
pub fn embed_routes(state: EmbedState) -> Router {
    Router::new()
        .route("/", get(embed::root))
        .route("/health", get(embed::health))
        .route("/info", get(embed::info))
        .route("/embed", post(embed::embed))
        .with_state(state)
}

/// 세그멘테이션 서비스 라우트
pub fn segment_routes(state: SegmentState) -> Router {
    Router::new()
        .route("/", get(segment::root))
        .route("/health", get(segment::health))
        .route("/info", get(segment::info))
        .route("/segment", post(segment::segment))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use percept_vision::provider::ModelProvider;
    use percept_vision::ui_types::ClassScheme;
    use tower::ServiceExt;

    fn mock_detect() -> Router {
        detect_routes(DetectState {
            provider: Arc::new(ModelProvider::unavailable("yolo", "no weights")),
            scheme: Arc::new(ClassScheme::Coco),
            default_conf: 0.3,
            max_results: 20,
        })
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_and_health() {
        let response = mock_detect()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["version"], "0.1.0");
        assert_eq!(body["status"], "running");

        let response = mock_detect()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], false);
    }

    #[tokio::test]
    async fn detect_mock_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.png");
        std::fs::write(&path, b"x").unwrap();

        let response = mock_detect()
            .oneshot(post_json(
                "/detect",
                serde_json::json!({ "image_path": path.to_string_lossy() }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 6);
        assert_eq!(body["detections"][0]["type"], "button");
        assert_eq!(body["detections"][0]["bbox"]["w"], 200);
    }

    #[tokio::test]
    async fn error_statuses_over_http() {
        let response = mock_detect()
            .oneshot(post_json(
                "/detect",
                serde_json::json!({ "image_path": "/nonexistent/screen.png" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], 404);

        let response = mock_detect()
            .oneshot(post_json("/detect", serde_json::json!({ "image": "%%%" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn embed_info_over_http() {
        let router = embed_routes(EmbedState {
            provider: Arc::new(ModelProvider::unavailable("dino", "none")),
            model_name: "facebook/dinov2-base".to_string(),
            dimensions: 768,
        });
        let response = router
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["model"], "mock");
        assert_eq!(body["dimensions"], 768);
    }
}
