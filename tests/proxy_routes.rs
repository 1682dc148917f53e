//! The inbound HTTP contract, driven through the axum router in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;
use vms_proxy::api::ProxyService;
use vms_proxy::config::{BackendSettings, StaticCredentials};
use vms_proxy::server::{AppState, router};

const TOKEN_PATH: &str = "/API/IDP/connect/token";

fn service_for(url: Option<String>, settings: BackendSettings) -> ProxyService {
    let fallback = StaticCredentials {
        url,
        username: Some("operator".to_string()),
        password: Some("secret".to_string()),
    };
    ProxyService::from_settings(&settings, None, Some(fallback)).unwrap()
}

fn app(service: ProxyService, deadline: Duration) -> axum::Router {
    router(Arc::new(AppState {
        service,
        request_deadline: deadline,
    }))
}

async fn post_json(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "access_token": "abc", "expires_in": 3600 }));
        })
        .await
}

#[tokio::test]
async fn test_single_request_end_to_end_reuses_token() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let cameras = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/rest/v1/cameras")
                .header("authorization", "Bearer abc");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "array": [{ "id": "cam-1" }] }));
        })
        .await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());

    let (status, body) = post_json(app(service.clone(), Duration::from_secs(10)), json!({ "endpoint": "/cameras" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["array"][0]["id"], json!("cam-1"));

    let (status, _) = post_json(app(service, Duration::from_secs(10)), json!({ "endpoint": "/cameras" })).await;
    assert_eq!(status, StatusCode::OK);

    token.assert_calls_async(1).await;
    cameras.assert_calls_async(2).await;
}

#[tokio::test]
async fn test_batch_request_shape() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/rest/v1/cameras/a/snapshot");
            then.status(200).header("content-type", "image/jpeg").body(b"abc".to_vec());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/rest/v1/cameras/c/snapshot");
            then.status(500);
        })
        .await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());
    let (status, body) = post_json(
        app(service, Duration::from_secs(10)),
        json!({
            "batchSnapshots": {
                "a": "/cameras/a/snapshot",
                "b": null,
                "c": "/cameras/c/snapshot"
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "images": { "a": "data:image/jpeg;base64,YWJj", "b": null, "c": null } })
    );
}

#[tokio::test]
async fn test_image_failure_surfaces_upstream_status() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/rest/v1/cameras/x/snapshot");
            then.status(404);
        })
        .await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());
    let (status, body) = post_json(
        app(service, Duration::from_secs(10)),
        json!({ "endpoint": "/cameras/x/snapshot", "returnImage": true }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_missing_configuration_is_500() {
    let service = service_for(None, BackendSettings::default());
    let (status, body) = post_json(app(service, Duration::from_secs(10)), json!({ "endpoint": "/cameras" })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("VMS_SERVER_URL"));
}

#[tokio::test]
async fn test_unknown_server_id_is_not_resolved_from_environment() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());
    let (status, body) = post_json(
        app(service, Duration::from_secs(10)),
        json!({ "endpoint": "/cameras", "serverId": "site-z" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("site-z"));
    token.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_invalid_request_is_400() {
    let service = service_for(Some("https://vms.local".to_string()), BackendSettings::default());

    let (status, body) = post_json(app(service.clone(), Duration::from_secs(10)), json!({ "method": "GET" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post_json(app(service, Duration::from_secs(10)), json!({ "batchSnapshots": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_timeout_is_504() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({ "access_token": "late" }));
        })
        .await;

    let settings = BackendSettings {
        timeout_secs: 1,
        ..BackendSettings::default()
    };
    // Explicit port: a single candidate, so one timeout ends the walk
    let service = service_for(Some(server.base_url()), settings);
    let (status, body) = post_json(app(service, Duration::from_secs(10)), json!({ "endpoint": "/cameras" })).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("Cannot reach"));
}

#[tokio::test]
async fn test_outer_deadline_is_504() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/rest/v1/cameras");
            then.status(200).delay(Duration::from_secs(3)).json_body(json!({}));
        })
        .await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());
    let (status, body) = post_json(app(service, Duration::from_millis(500)), json!({ "endpoint": "/cameras" })).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("unreachable from proxy"));
}

#[tokio::test]
async fn test_concurrent_requests_authenticate_once() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/rest/v1/cameras");
            then.status(200).json_body(json!({ "array": [] }));
        })
        .await;

    let service = service_for(Some(server.base_url()), BackendSettings::default());
    let first = post_json(app(service.clone(), Duration::from_secs(10)), json!({ "endpoint": "/cameras" }));
    let second = post_json(app(service.clone(), Duration::from_secs(10)), json!({ "endpoint": "/cameras" }));
    let ((s1, b1), (s2, b2)) = tokio::join!(first, second);

    assert_eq!((s1, s2), (StatusCode::OK, StatusCode::OK));
    assert_eq!(b1, json!({ "array": [] }));
    assert_eq!(b2, json!({ "array": [] }));
    assert_eq!(service.auth().cache().len().await, 1);
    token.assert_calls_async(1).await;
}

#[tokio::test]
async fn test_cors_preflight() {
    let service = service_for(None, BackendSettings::default());
    let response = app(service, Duration::from_secs(10))
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/")
                .header("origin", "https://dashboard.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_responses_carry_cors_headers() {
    let service = service_for(None, BackendSettings::default());
    let response = app(service, Duration::from_secs(10))
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .header("origin", "https://dashboard.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}
