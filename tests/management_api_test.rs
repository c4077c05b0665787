//! # 管理端 API 测试

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use repo_proxy::config::{AppConfig, MirrorConfig};
use repo_proxy::management::{ManagementConfig, ManagementServer};
use repo_proxy::proxy::ProxyState;

fn server(config: AppConfig) -> ManagementServer {
    let state = Arc::new(ProxyState::from_config(Arc::new(config)).unwrap());
    ManagementServer::new(ManagementConfig::default(), state).unwrap()
}

async fn get_json(server: &ManagementServer, uri: &str) -> (StatusCode, Value) {
    let response = server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get_json(&server(AppConfig::default()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_info_lists_builtin_mirrors_in_order() {
    let (status, body) = get_json(&server(AppConfig::default()), "/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "repo-proxy");
    assert_eq!(body["heuristics"], true);
    assert_eq!(body["upstream_timeout_seconds"], 30);

    let mirrors = body["mirrors"].as_array().unwrap();
    assert_eq!(mirrors.len(), 16);
    assert_eq!(
        mirrors[0],
        serde_json::json!({
            "type": "maven",
            "key": "central",
            "upstream": "https://repo1.maven.org/maven2",
            "prefix": "/maven/central/",
        })
    );
    assert_eq!(mirrors[15]["prefix"], "/apt/debian/");
}

#[tokio::test]
async fn test_info_reflects_custom_config() {
    let mut config = AppConfig::default();
    config.routing.heuristics = false;
    config.upstream.timeout_seconds = 5;
    config.mirrors = vec![MirrorConfig {
        repo_type: "npm".to_string(),
        key: "internal".to_string(),
        url: "https://npm.example.com/registry/".to_string(),
    }];

    let (_, body) = get_json(&server(config), "/info").await;
    assert_eq!(body["heuristics"], false);
    assert_eq!(body["upstream_timeout_seconds"], 5);
    assert_eq!(body["mirrors"][0]["upstream"], "https://npm.example.com/registry");
    assert_eq!(body["mirrors"][0]["prefix"], "/npm/internal/");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = server(AppConfig::default())
        .router()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
