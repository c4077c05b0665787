//! # 响应中继
//!
//! 将上游状态码与响应头原样转回（剔除逐跳头、注入 CORS 与 Via），
//! 再逐块转发响应体，不在内存中缓冲完整内容。
//! 响应头一旦发出，后续失败只能中断连接，不会改写状态码。

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::HeaderMap;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ProxyError, Result};
use crate::proxy::client::UpstreamResponse;
use crate::proxy::headers::{CORS_ALLOW_ORIGIN, hop_by_hop_names};

/// 下游响应写入端
#[async_trait]
pub trait ResponseSink: Send {
    async fn write_header(&mut self, header: Box<ResponseHeader>, end_of_stream: bool) -> pingora_core::Result<()>;

    async fn write_body(&mut self, data: Option<Bytes>, end_of_stream: bool) -> pingora_core::Result<()>;
}

#[async_trait]
impl ResponseSink for Session {
    async fn write_header(&mut self, header: Box<ResponseHeader>, end_of_stream: bool) -> pingora_core::Result<()> {
        self.write_response_header(header, end_of_stream).await
    }

    async fn write_body(&mut self, data: Option<Bytes>, end_of_stream: bool) -> pingora_core::Result<()> {
        self.write_response_body(data, end_of_stream).await
    }
}

/// 中继统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub status: u16,
    pub bytes: u64,
}

/// 由上游状态码与响应头构造下游响应头
pub fn build_response_header(status: u16, upstream_headers: &HeaderMap, via: &str) -> Result<ResponseHeader> {
    let mut response = ResponseHeader::build(status, Some(upstream_headers.len() + 2))
        .map_err(|e| ProxyError::internal_with_source("构造响应头失败", e))?;

    let stripped = hop_by_hop_names(upstream_headers);
    for (name, value) in upstream_headers {
        if stripped.contains(name) || *name == http::header::ACCESS_CONTROL_ALLOW_ORIGIN {
            continue;
        }
        response
            .append_header(name.as_str().to_owned(), value.clone())
            .map_err(|e| ProxyError::internal_with_source("复制响应头失败", e))?;
    }

    response
        .insert_header("access-control-allow-origin", CORS_ALLOW_ORIGIN)
        .map_err(|e| ProxyError::internal_with_source("设置CORS头失败", e))?;
    response
        .append_header("via", via.to_owned())
        .map_err(|e| ProxyError::internal_with_source("设置Via头失败", e))?;

    Ok(response)
}

/// 把上游响应写入下游
///
/// `chunk_timeout` 约束相邻两个响应体块之间的等待时间。
/// 下游写失败时触发 `cancel`，上游流随之被丢弃。
pub async fn relay_response<S: ResponseSink + ?Sized>(
    sink: &mut S,
    response: UpstreamResponse,
    is_head: bool,
    via: &str,
    chunk_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<RelayStats> {
    let UpstreamResponse {
        status,
        headers,
        mut body,
    } = response;

    let header = build_response_header(status, &headers, via)?;
    let mut stats = RelayStats { status, bytes: 0 };

    if let Err(e) = sink.write_header(Box::new(header), is_head).await {
        cancel.cancel();
        return Err(ProxyError::mid_stream_with_source("写入下游响应头失败", e));
    }
    if is_head {
        return Ok(stats);
    }

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                return Err(ProxyError::mid_stream("请求已取消"));
            }
            next = tokio::time::timeout(chunk_timeout, body.next()) => next,
        };

        let chunk = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                cancel.cancel();
                return Err(match e {
                    ProxyError::MidStream { .. } => e,
                    other => ProxyError::mid_stream_with_source("上游响应体中断", other),
                });
            }
            Ok(None) => break,
            Err(_) => {
                cancel.cancel();
                return Err(ProxyError::mid_stream(format!(
                    "上游响应体 {}s 无数据",
                    chunk_timeout.as_secs()
                )));
            }
        };

        if chunk.is_empty() {
            continue;
        }
        stats.bytes += chunk.len() as u64;
        if let Err(e) = sink.write_body(Some(chunk), false).await {
            cancel.cancel();
            return Err(ProxyError::mid_stream_with_source("写入下游响应体失败", e));
        }
    }

    if let Err(e) = sink.write_body(None, true).await {
        cancel.cancel();
        return Err(ProxyError::mid_stream_with_source("结束下游响应失败", e));
    }
    Ok(stats)
}
