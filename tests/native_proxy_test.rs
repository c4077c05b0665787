//! # 代理端口端到端测试
//!
//! 在临时端口上启动 Pingora 代理，上游由 wiremock 模拟

use pretty_assertions::assert_eq;
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repo_proxy::config::{AppConfig, MirrorConfig};
use repo_proxy::proxy::{PingoraProxyServer, ProxyState};

fn mirror(repo_type: &str, key: &str, url: String) -> MirrorConfig {
    MirrorConfig {
        repo_type: repo_type.to_string(),
        key: key.to_string(),
        url,
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// 在独立线程中运行代理，返回代理根地址
async fn start_proxy(mirrors: Vec<MirrorConfig>) -> String {
    let port = free_port();
    let mut config = AppConfig::default();
    config.dual_port.proxy.host = "127.0.0.1".to_string();
    config.dual_port.proxy.port = port;
    config.upstream.timeout_seconds = 5;
    config.mirrors = mirrors;

    let state = Arc::new(ProxyState::from_config(Arc::new(config)).unwrap());
    std::thread::spawn(move || {
        let server = PingoraProxyServer::new(state).build_server().unwrap();
        server.run_forever();
    });

    let address = format!("127.0.0.1:{port}");
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(&address).await.is_ok() {
            return format!("http://{address}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("proxy did not start on {address}");
}

fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

async fn npm_proxy() -> (MockServer, String) {
    let upstream = MockServer::start().await;
    let proxy = start_proxy(vec![mirror("npm", "official", format!("{}/registry", upstream.uri()))]).await;
    (upstream, proxy)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_explicit_prefix_rewrites_request() {
    let (upstream, proxy) = npm_proxy().await;
    Mock::given(method("GET"))
        .and(path("/registry/left-pad"))
        .and(query_param("write", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = client()
        .get(format!("{proxy}/npm/official/left-pad?write=true"))
        .header("user-agent", "npm/10.2")
        .header("cookie", "session=1")
        .header("x-custom", "1")
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "{}");

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let headers = &received[0].headers;
    assert!(headers.get("cookie").is_none());
    assert!(headers.get("x-custom").is_none());
    assert_eq!(headers["user-agent"], "npm/10.2");
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["via"], "1.1 repo-proxy");
    assert_eq!(
        headers["host"].to_str().unwrap(),
        upstream.address().to_string()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hop_by_hop_response_headers_are_stripped() {
    let (upstream, proxy) = npm_proxy().await;
    Mock::given(method("GET"))
        .and(path("/registry/react"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("connection", "x-upstream-hop")
                .insert_header("x-upstream-hop", "1")
                .insert_header("proxy-authenticate", "Basic realm=\"npm\"")
                .insert_header("etag", "\"v1\"")
                .set_body_string("react"),
        )
        .mount(&upstream)
        .await;

    let response = client().get(format!("{proxy}/npm/official/react")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers.get("x-upstream-hop").is_none());
    assert!(headers.get("proxy-authenticate").is_none());
    assert_eq!(headers["etag"], "\"v1\"");
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["via"], "1.1 repo-proxy");
    assert_eq!(response.text().await.unwrap(), "react");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_head_returns_no_body() {
    let (upstream, proxy) = npm_proxy().await;
    Mock::given(method("HEAD"))
        .and(path("/registry/lodash"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"v2\""))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = client().head(format!("{proxy}/npm/official/lodash")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["etag"], "\"v2\"");
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_preflight_and_method_gate() {
    let (upstream, proxy) = npm_proxy().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let preflight = client()
        .request(Method::OPTIONS, format!("{proxy}/npm/official/react"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        preflight.headers()["access-control-allow-methods"],
        "GET, HEAD, OPTIONS"
    );

    let post = client()
        .post(format!("{proxy}/npm/official/react"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(post.headers()["allow"], "GET, HEAD, OPTIONS");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_path_gets_usage_hint() {
    let (_upstream, proxy) = npm_proxy().await;

    let response = client().get(format!("{proxy}/favicon.ico")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().contains("/npm/official/<path>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_disconnect_stops_maven_fallback() {
    let slow = MockServer::start().await;
    let next = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_secs(1)))
        .mount(&slow)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&next)
        .await;

    let proxy = start_proxy(vec![
        mirror("maven", "slow", slow.uri()),
        mirror("maven", "next", next.uri()),
    ])
    .await;

    let result = client()
        .get(format!("{proxy}/org/example/lib/1.0/lib-1.0.jar"))
        .timeout(Duration::from_millis(300))
        .send()
        .await;
    assert!(result.is_err());

    // 第一个候选在 1s 后才返回 404，等待足够久以观察是否继续回退
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(slow.received_requests().await.unwrap().len(), 1);
    assert!(next.received_requests().await.unwrap().is_empty());
}
