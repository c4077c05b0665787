//! # 上游 HTTP 客户端
//!
//! 回退解析需要逐个尝试候选上游并在拿到响应头后决定是否继续，
//! 这里用 trait 把发起请求的能力抽象出来，生产实现基于 reqwest 连接池。

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::{HeaderMap, Method};
use std::fmt;

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};

/// 上游响应体：惰性的、不可重放的字节块流
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// 发往上游的请求
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// 上游响应，响应体尚未读取
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// 上游客户端
///
/// 传输失败返回 `UpstreamTimeout` 或 `UpstreamTransport`，任何状态码都视为成功拿到响应。
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

/// 基于 reqwest 的上游客户端，不跟随重定向、不解压响应体
#[derive(Debug, Clone)]
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
    timeout_seconds: u64,
}

impl ReqwestUpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| ProxyError::server_init_with_source("创建上游HTTP客户端失败", e))?;

        Ok(Self {
            client,
            timeout_seconds: config.timeout_seconds,
        })
    }

    fn classify_error(&self, url: &str, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::upstream_timeout(format!("{url}: {err}"), self.timeout_seconds)
        } else {
            ProxyError::upstream_transport_with_source(format!("请求上游失败: {url}"), err)
        }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let UpstreamRequest {
            method,
            url,
            headers,
        } = request;

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.classify_error(&url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| ProxyError::mid_stream_with_source("读取上游响应体失败", e))
            })
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
