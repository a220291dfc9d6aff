use super::*;
use crate::builder::test_helpers::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;


const FRONTEND: &str = "http://localhost:5173";

/// Router over a builder with the given provider, plus the builder itself
async fn create_test_app(provider: StaticProvider) -> (Router, Arc<PackBuilder>, tempfile::TempDir) {
    let (builder, temp_dir) = create_test_builder(provider).await;
    let mut config = (*builder.get_config()).clone();
    config.web.frontend = FRONTEND.to_string();
    let builder = Arc::new(builder);
    let app = create_router(builder.clone(), Arc::new(config));
    (app, builder, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let (status, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let (builder, _temp_dir) = create_test_builder(StaticProvider::default()).await;

    let mut config = (*builder.get_config()).clone();
    config.web.address = "127.0.0.1".to_string();
    config.web.port = 0;
    let config = Arc::new(config);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(Arc::new(builder), config, async move {
        stop_rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_allows_frontend_origin() {
    let (app, _builder, _temp_dir) = create_test_app(StaticProvider::default()).await;

    let request = Request::builder()
        .uri("/api/info")
        .header("Origin", FRONTEND)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        FRONTEND
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .unwrap(),
        "true"
    );

    let request = Request::builder()
        .uri("/api/info")
        .header("Origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_frontend_served_outside_api() {
    let (app, builder, _temp_dir) = create_test_app(StaticProvider::default()).await;
    let public = builder.working_directory().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), "<html>packs</html>").unwrap();

    let request = Request::builder()
        .uri("/index.html")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>packs</html>");

    let (status, _) = send_json(&app, "GET", "/missing.js", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
