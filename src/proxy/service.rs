//! # Pingora 仓库代理服务
//!
//! 请求阶段完成方法检查与路由决策：
//! 单一目标交给 Pingora 原生转发，Maven 回退在 `request_filter` 内完成并直接写回响应。

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, header};
use pingora_core::{Error, ErrorSource, ErrorType, upstreams::peer::HttpPeer};
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{FailToProxy, ProxyHttp, Session};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorCategory, ProxyError};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::context::{ProxyContext, UpstreamTarget};
use crate::proxy::fallback::FallbackRequest;
use crate::proxy::headers::{CORS_ALLOW_ORIGIN, dropped_request_headers, hop_by_hop_names};
use crate::proxy::relay::relay_response;
use crate::proxy::response::{write_preflight, write_proxy_error};
use crate::proxy::state::ProxyState;
use crate::proxy::types::RoutingDecision;
use crate::proxy::upstream_service::UpstreamService;
use crate::registry::MirrorEntry;
use crate::{ldebug, lerror, linfo, lwarn};

/// 仓库代理服务
pub struct ProxyService {
    state: Arc<ProxyState>,
}

impl ProxyService {
    /// 创建新的代理服务实例
    #[must_use]
    pub const fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    /// 写出本地错误响应并记录状态码
    async fn respond_error(
        &self,
        session: &mut Session,
        ctx: &mut ProxyContext,
        err: &ProxyError,
        is_head: bool,
    ) -> pingora_core::Result<()> {
        let status = err.status_code();
        ctx.status = Some(status);

        match err.category() {
            ErrorCategory::Client => linfo!(
                &ctx.request_id,
                LogStage::Response,
                LogComponent::Proxy,
                "client_error",
                "请求被拒绝",
                status = status,
                error = %err
            ),
            ErrorCategory::Server => lwarn!(
                &ctx.request_id,
                LogStage::ResponseFailure,
                LogComponent::Proxy,
                "upstream_error",
                "上游处理失败",
                status = status,
                error = %err
            ),
        }

        let hint = matches!(err, ProxyError::NoRoute { .. }).then(|| self.state.router().usage_hint());
        write_proxy_error(session, err, hint.as_deref(), is_head).await
    }

    /// 多候选回退：解析后直接把响应写回下游
    async fn proxy_with_fallback(
        &self,
        session: &mut Session,
        ctx: &mut ProxyContext,
        method: &Method,
        path: &str,
        query: Option<&str>,
        candidates: &[Arc<MirrorEntry>],
    ) -> pingora_core::Result<bool> {
        let is_head = *method == Method::HEAD;
        let headers = session.req_header().headers.clone();
        let request = FallbackRequest {
            request_id: &ctx.request_id,
            method,
            path,
            query,
            headers: &headers,
        };

        let resolver = self.state.resolver();
        let outcome = {
            let resolve = resolver.resolve(request, candidates, &ctx.cancel);
            tokio::pin!(resolve);

            // GET/HEAD 没有请求体，空闲读返回错误即客户端已断开
            let finished = tokio::select! {
                result = &mut resolve => Some(result),
                idle = session.downstream_session.read_body_or_idle(true) => {
                    if let Err(e) = idle {
                        ldebug!(
                            &ctx.request_id,
                            LogStage::Fallback,
                            LogComponent::Resolver,
                            "client_disconnected",
                            "回退期间客户端断开，取消剩余尝试",
                            error = %e
                        );
                        ctx.cancel.cancel();
                    }
                    None
                }
            };
            match finished {
                Some(result) => result,
                None => resolve.await,
            }
        };

        if ctx.cancel.is_cancelled() {
            if let Err(failure) = outcome {
                ctx.attempts = failure.attempts;
            }
            return Err(Error::explain(ErrorType::ConnectionClosed, "client disconnected during fallback").into_down());
        }

        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(failure) => {
                ctx.attempts = failure.attempts;
                self.respond_error(session, ctx, &failure.error, is_head).await?;
                return Ok(true);
            }
        };
        ctx.attempts = resolution.attempts;

        let via = self.state.config().upstream.via.clone();
        let chunk_timeout: Duration = resolver.attempt_timeout();
        match relay_response(session, resolution.response, is_head, &via, chunk_timeout, &ctx.cancel).await {
            Ok(stats) => {
                ctx.status = Some(stats.status);
                ctx.bytes_sent = stats.bytes;
                Ok(true)
            }
            Err(err) if session.response_written().is_none() => {
                self.respond_error(session, ctx, &err, is_head).await?;
                Ok(true)
            }
            Err(err) => {
                ctx.status = session.response_written().map(|resp| resp.status.as_u16());
                lerror!(
                    &ctx.request_id,
                    LogStage::ResponseFailure,
                    LogComponent::Relay,
                    "mid_stream_failure",
                    "响应头已发送后传输中断",
                    mirror = %resolution.mirror.prefix(),
                    error = %err
                );
                Err(Error::explain(ErrorType::WriteError, err.to_string()))
            }
        }
    }

    fn target<'a>(ctx: &'a ProxyContext) -> pingora_core::Result<&'a UpstreamTarget> {
        ctx.target
            .as_ref()
            .ok_or_else(|| Error::explain(ErrorType::InternalError, "upstream target not resolved"))
    }
}

/// `ProxyError` 转为 Pingora 错误，状态码随之保留
fn to_pingora_error(err: &ProxyError) -> Box<Error> {
    Error::explain(ErrorType::HTTPStatus(err.status_code()), err.to_string())
}

/// 把 Pingora 失败映射为客户端可见的错误；下游自身的失败返回 `None`
fn classify_failure(e: &Error) -> Option<ProxyError> {
    if let ErrorType::HTTPStatus(code) = e.etype() {
        return Some(match *code {
            504 => ProxyError::upstream_timeout(e.to_string(), 0),
            502 => ProxyError::upstream_transport(e.to_string()),
            code if code < 500 && code >= 400 => ProxyError::UpstreamStatus {
                status: code,
                url: String::new(),
            },
            _ => ProxyError::internal(e.to_string()),
        });
    }

    let timed_out = matches!(
        e.etype(),
        ErrorType::ConnectTimedout
            | ErrorType::ReadTimedout
            | ErrorType::WriteTimedout
            | ErrorType::TLSHandshakeTimedout
    );
    match e.esource() {
        ErrorSource::Downstream => None,
        ErrorSource::Upstream if timed_out => Some(ProxyError::upstream_timeout(e.to_string(), 0)),
        ErrorSource::Upstream => Some(ProxyError::upstream_transport(e.to_string())),
        ErrorSource::Internal | ErrorSource::Unset if timed_out => {
            Some(ProxyError::upstream_timeout(e.to_string(), 0))
        }
        ErrorSource::Internal | ErrorSource::Unset => Some(ProxyError::internal(e.to_string())),
    }
}

#[async_trait]
impl ProxyHttp for ProxyService {
    type CTX = ProxyContext;

    fn new_ctx(&self) -> Self::CTX {
        ProxyContext::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> pingora_core::Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        let path = req.uri.path().to_string();
        let query = req.uri.query().map(str::to_string);
        let is_head = method == Method::HEAD;

        ldebug!(
            &ctx.request_id,
            LogStage::RequestStart,
            LogComponent::Proxy,
            "request_received",
            "收到仓库请求",
            method = %method,
            path = %path
        );

        if method == Method::OPTIONS {
            write_preflight(session).await?;
            ctx.status = Some(204);
            return Ok(true);
        }

        if method != Method::GET && method != Method::HEAD {
            let err = ProxyError::method_not_allowed(method.as_str());
            self.respond_error(session, ctx, &err, is_head).await?;
            return Ok(true);
        }

        let decision = match self.state.router().decide(&path) {
            Ok(decision) => decision,
            Err(err) => {
                self.respond_error(session, ctx, &err, is_head).await?;
                return Ok(true);
            }
        };
        ctx.route_kind = decision.kind();

        ldebug!(
            &ctx.request_id,
            LogStage::Routing,
            LogComponent::Router,
            "route_decided",
            "路由决策完成",
            route = %ctx.route_kind
        );

        match decision {
            RoutingDecision::Explicit { mirror, path: rest } | RoutingDecision::Heuristic { mirror, path: rest } => {
                let path_and_query = mirror.upstream_path(&rest, query.as_deref());
                ctx.target = Some(UpstreamTarget {
                    mirror,
                    path_and_query,
                });
                Ok(false)
            }
            RoutingDecision::HeuristicAmbiguous { candidates, path } => {
                self.proxy_with_fallback(session, ctx, &method, &path, query.as_deref(), &candidates)
                    .await
            }
            RoutingDecision::Unresolved => {
                self.respond_error(session, ctx, &ProxyError::no_route(path), is_head).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(&self, _session: &mut Session, ctx: &mut Self::CTX) -> pingora_core::Result<Box<HttpPeer>> {
        let target = Self::target(ctx)?;
        self.state
            .upstream()
            .select_peer(&ctx.request_id, target)
            .await
            .map_err(|e| to_pingora_error(&e))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<()> {
        let target = Self::target(ctx)?;
        let uri: http::Uri = target.path_and_query.parse().map_err(|e| {
            Error::explain(ErrorType::InternalError, format!("invalid upstream uri {}: {e}", target.path_and_query))
        })?;
        upstream_request.set_uri(uri);

        let dropped = dropped_request_headers(&upstream_request.headers);
        for name in &dropped {
            upstream_request.remove_header(name);
        }

        let address = UpstreamService::address(target).map_err(|e| to_pingora_error(&e))?;
        upstream_request.insert_header(header::HOST, address.host_header)?;
        upstream_request.append_header(header::VIA, self.state.config().upstream.via.clone())?;

        ldebug!(
            &ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "upstream_request_prepared",
            "上游请求头已改写",
            upstream = %target.mirror.origin(),
            uri = %target.path_and_query,
            dropped_headers = dropped.len()
        );
        Ok(())
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<()> {
        for name in hop_by_hop_names(&upstream_response.headers) {
            upstream_response.remove_header(&name);
        }
        upstream_response.insert_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, CORS_ALLOW_ORIGIN)?;
        upstream_response.append_header(header::VIA, self.state.config().upstream.via.clone())?;

        ctx.status = Some(upstream_response.status.as_u16());
        Ok(())
    }

    fn response_body_filter(
        &self,
        _session: &mut Session,
        body: &mut Option<Bytes>,
        _end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> pingora_core::Result<Option<Duration>> {
        if let Some(chunk) = body {
            ctx.bytes_sent += chunk.len() as u64;
        }
        Ok(None)
    }

    async fn fail_to_proxy(&self, session: &mut Session, e: &Error, ctx: &mut Self::CTX) -> FailToProxy
    where
        Self::CTX: Send + Sync,
    {
        ctx.cancel.cancel();

        let Some(err) = classify_failure(e) else {
            ldebug!(
                &ctx.request_id,
                LogStage::ResponseFailure,
                LogComponent::Proxy,
                "downstream_failure",
                "下游连接失败",
                error = %e
            );
            return FailToProxy {
                error_code: 0,
                can_reuse_downstream: false,
            };
        };

        if let Some(written) = session.response_written() {
            return FailToProxy {
                error_code: written.status.as_u16(),
                can_reuse_downstream: false,
            };
        }

        let is_head = session.req_header().method == Method::HEAD;
        if let Err(write_err) = self.respond_error(session, ctx, &err, is_head).await {
            lwarn!(
                &ctx.request_id,
                LogStage::ResponseFailure,
                LogComponent::Proxy,
                "error_response_failed",
                "写出错误响应失败",
                error = %write_err
            );
        }

        FailToProxy {
            error_code: err.status_code(),
            can_reuse_downstream: false,
        }
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        ctx.cancel.cancel();

        let req = session.req_header();
        let status = ctx
            .status
            .or_else(|| session.response_written().map(|resp| resp.status.as_u16()))
            .unwrap_or(0);
        let duration_ms = ctx.start_time.elapsed().as_millis();
        let upstream = ctx.upstream_url().unwrap_or_default();

        if let Some(error) = e {
            lwarn!(
                &ctx.request_id,
                LogStage::Response,
                LogComponent::Proxy,
                "request_failed",
                "仓库请求失败",
                method = %req.method,
                path = %req.uri.path(),
                route = %ctx.route_kind,
                status = status,
                duration_ms = duration_ms,
                upstream = %upstream,
                attempts = ctx.attempts.len(),
                error = %error
            );
        } else {
            linfo!(
                &ctx.request_id,
                LogStage::Response,
                LogComponent::Proxy,
                "request_completed",
                "仓库请求完成",
                method = %req.method,
                path = %req.uri.path(),
                route = %ctx.route_kind,
                status = status,
                duration_ms = duration_ms,
                bytes = ctx.bytes_sent,
                upstream = %upstream,
                attempts = ctx.attempts.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorType::ConnectTimedout, ErrorSource::Upstream, Some(504))]
    #[case(ErrorType::ReadTimedout, ErrorSource::Upstream, Some(504))]
    #[case(ErrorType::ConnectRefused, ErrorSource::Upstream, Some(502))]
    #[case(ErrorType::ConnectNoRoute, ErrorSource::Upstream, Some(502))]
    #[case(ErrorType::InternalError, ErrorSource::Internal, Some(500))]
    #[case(ErrorType::WriteError, ErrorSource::Downstream, None)]
    fn test_failure_classification(#[case] etype: ErrorType, #[case] source: ErrorSource, #[case] expected: Option<u16>) {
        let mut err = Error::new(etype);
        err.esource = source;
        assert_eq!(classify_failure(&err).map(|e| e.status_code()), expected);
    }

    #[rstest]
    #[case(502)]
    #[case(504)]
    #[case(404)]
    fn test_http_status_errors_keep_code(#[case] code: u16) {
        let err = Error::explain(ErrorType::HTTPStatus(code), "status");
        assert_eq!(classify_failure(&err).map(|e| e.status_code()), Some(code));
    }

    #[test]
    fn test_to_pingora_error_keeps_status() {
        let err = to_pingora_error(&ProxyError::upstream_unavailable("dns"));
        assert_eq!(err.etype(), &ErrorType::HTTPStatus(502));
    }
}
