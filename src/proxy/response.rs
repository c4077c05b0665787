//! # 本地生成的响应
//!
//! 预检、方法不允许、路由失败与上游失败都由代理自行应答，统一带上 CORS 头。

use bytes::Bytes;
use pingora_core::{Error as PingoraError, ErrorType, Result as PingoraResult};
use pingora_http::ResponseHeader;

use crate::error::ProxyError;
use crate::proxy::headers::{ALLOWED_METHODS, CORS_ALLOW_HEADERS, CORS_ALLOW_ORIGIN, CORS_MAX_AGE};
use crate::proxy::relay::ResponseSink;

fn header_error(what: &str, err: &PingoraError) -> Box<PingoraError> {
    PingoraError::explain(ErrorType::InternalError, format!("Failed to set {what}: {err}"))
}

fn base_header(status: u16) -> PingoraResult<ResponseHeader> {
    let mut resp = ResponseHeader::build(status, Some(6))
        .map_err(|e| PingoraError::explain(ErrorType::InternalError, format!("Failed to build response header: {e}")))?;
    resp.insert_header("access-control-allow-origin", CORS_ALLOW_ORIGIN)
        .map_err(|e| header_error("access-control-allow-origin", &e))?;
    Ok(resp)
}

/// 写出纯文本响应；HEAD 请求只写响应头
pub async fn write_text<S: ResponseSink + ?Sized>(
    sink: &mut S,
    status: u16,
    body: &str,
    extra_headers: &[(&'static str, &'static str)],
    is_head: bool,
) -> PingoraResult<()> {
    let mut resp = base_header(status)?;
    for (name, value) in extra_headers {
        resp.insert_header(*name, *value)
            .map_err(|e| header_error(name, &e))?;
    }
    resp.insert_header("content-type", "text/plain; charset=utf-8")
        .map_err(|e| header_error("content-type", &e))?;
    resp.insert_header("cache-control", "no-store")
        .map_err(|e| header_error("cache-control", &e))?;
    resp.set_content_length(body.len())
        .map_err(|e| header_error("content-length", &e))?;

    if is_head || body.is_empty() {
        return sink.write_header(Box::new(resp), true).await;
    }
    sink.write_header(Box::new(resp), false).await?;
    sink.write_body(Some(Bytes::copy_from_slice(body.as_bytes())), true)
        .await
}

/// CORS 预检：204，无响应体
pub async fn write_preflight<S: ResponseSink + ?Sized>(sink: &mut S) -> PingoraResult<()> {
    let mut resp = base_header(204)?;
    resp.insert_header("access-control-allow-methods", ALLOWED_METHODS)
        .map_err(|e| header_error("access-control-allow-methods", &e))?;
    resp.insert_header("access-control-allow-headers", CORS_ALLOW_HEADERS)
        .map_err(|e| header_error("access-control-allow-headers", &e))?;
    resp.insert_header("access-control-max-age", CORS_MAX_AGE)
        .map_err(|e| header_error("access-control-max-age", &e))?;
    sink.write_header(Box::new(resp), true).await
}

/// 按错误类型写出对应状态码的文本响应
///
/// `usage_hint` 仅用于 404。
pub async fn write_proxy_error<S: ResponseSink + ?Sized>(
    sink: &mut S,
    err: &ProxyError,
    usage_hint: Option<&str>,
    is_head: bool,
) -> PingoraResult<()> {
    let (status, code) = err.to_http_response_parts();
    match err {
        ProxyError::MethodNotAllowed { .. } => {
            write_text(
                sink,
                status.as_u16(),
                "Method Not Allowed\n",
                &[("allow", ALLOWED_METHODS)],
                is_head,
            )
            .await
        }
        ProxyError::NoRoute { .. } => {
            let body = usage_hint.unwrap_or("No repository matched this path.\n");
            write_text(sink, status.as_u16(), body, &[], is_head).await
        }
        _ => {
            let body = format!("{code}: {}\n", status.canonical_reason().unwrap_or("Error"));
            write_text(sink, status.as_u16(), &body, &[], is_head).await
        }
    }
}
