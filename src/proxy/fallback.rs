//! # 有序回退解析
//!
//! 按配置顺序逐个请求候选镜像，状态码 < 400 即采用；否则记录并继续。
//! 全部失败时返回最后一个 HTTP 错误响应；一个响应都没拿到时，
//! 全部超时返回 504，否则返回 502。尝试严格串行。

use futures::StreamExt;
use http::{HeaderMap, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::client::{UpstreamClient, UpstreamRequest, UpstreamResponse};
use crate::proxy::headers::forwardable_request_headers;
use crate::proxy::types::{AttemptOutcome, TransportFailure, UpstreamAttempt};
use crate::registry::MirrorEntry;
use crate::{ldebug, linfo, lwarn};

/// 丢弃错误响应前最多读取的响应体字节数
const DRAIN_LIMIT: usize = 64 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 回退解析结果
#[derive(Debug)]
pub struct Resolution {
    /// 采用的响应，全部失败时是最后一个 HTTP 错误响应
    pub response: UpstreamResponse,
    /// 产生该响应的镜像
    pub mirror: Arc<MirrorEntry>,
    /// 全部尝试记录，按顺序
    pub attempts: Vec<UpstreamAttempt>,
}

/// 回退解析失败：没有拿到任何响应
#[derive(Debug)]
pub struct ResolutionFailure {
    pub error: ProxyError,
    pub attempts: Vec<UpstreamAttempt>,
}

/// 单个解析任务的输入
#[derive(Debug, Clone, Copy)]
pub struct FallbackRequest<'a> {
    pub request_id: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

/// 有序回退解析器
pub struct FallbackResolver {
    client: Arc<dyn UpstreamClient>,
    attempt_timeout: Duration,
    via: String,
}

impl FallbackResolver {
    #[must_use]
    pub fn new(client: Arc<dyn UpstreamClient>, attempt_timeout: Duration, via: impl Into<String>) -> Self {
        Self {
            client,
            attempt_timeout,
            via: via.into(),
        }
    }

    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// 依次尝试候选镜像
    ///
    /// `cancel` 被触发时立即放弃当前尝试并返回失败。
    pub async fn resolve(
        &self,
        request: FallbackRequest<'_>,
        candidates: &[Arc<MirrorEntry>],
        cancel: &CancellationToken,
    ) -> std::result::Result<Resolution, ResolutionFailure> {
        let headers = forwardable_request_headers(request.headers, &self.via);
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_error: Option<(UpstreamResponse, Arc<MirrorEntry>)> = None;

        for mirror in candidates {
            let url = mirror.upstream_url(request.path, request.query);
            ldebug!(
                request.request_id,
                LogStage::Fallback,
                LogComponent::Resolver,
                "fallback_attempt",
                "尝试候选上游",
                mirror = %mirror.prefix(),
                url = %url
            );

            let upstream_request = UpstreamRequest {
                method: request.method.clone(),
                url: url.clone(),
                headers: headers.clone(),
            };

            let result = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(ResolutionFailure {
                        error: ProxyError::upstream_transport("客户端已断开，放弃回退"),
                        attempts,
                    });
                }
                result = tokio::time::timeout(self.attempt_timeout, self.client.send(upstream_request)) => result,
            };

            let outcome = match result {
                Ok(Ok(response)) if response.status < 400 => {
                    linfo!(
                        request.request_id,
                        LogStage::Fallback,
                        LogComponent::Resolver,
                        "fallback_selected",
                        "候选上游返回成功",
                        mirror = %mirror.prefix(),
                        status = response.status,
                        attempt = attempts.len() + 1
                    );
                    attempts.push(UpstreamAttempt {
                        mirror: Arc::clone(mirror),
                        url,
                        outcome: AttemptOutcome::Success {
                            status: response.status,
                        },
                    });
                    if let Some((previous, _)) = last_error.take() {
                        drain_body(previous).await;
                    }
                    return Ok(Resolution {
                        response,
                        mirror: Arc::clone(mirror),
                        attempts,
                    });
                }
                Ok(Ok(response)) => {
                    let status = response.status;
                    // 只保留最后一个错误响应
                    if let Some((previous, _)) = last_error.replace((response, Arc::clone(mirror))) {
                        drain_body(previous).await;
                    }
                    AttemptOutcome::HttpError { status }
                }
                Ok(Err(err)) => Self::transport_outcome(&err),
                Err(_) => AttemptOutcome::TransportFailure {
                    kind: TransportFailure::Timeout,
                    message: format!("超过 {}s 未响应", self.attempt_timeout.as_secs()),
                },
            };

            lwarn!(
                request.request_id,
                LogStage::Fallback,
                LogComponent::Resolver,
                "fallback_candidate_failed",
                "候选上游失败，继续下一个",
                mirror = %mirror.prefix(),
                outcome = ?outcome
            );
            attempts.push(UpstreamAttempt {
                mirror: Arc::clone(mirror),
                url,
                outcome,
            });
        }

        if let Some((response, mirror)) = last_error {
            linfo!(
                request.request_id,
                LogStage::Fallback,
                LogComponent::Resolver,
                "fallback_exhausted_http_error",
                "全部候选失败，返回最后一个错误响应",
                status = response.status,
                attempts = attempts.len()
            );
            return Ok(Resolution {
                response,
                mirror,
                attempts,
            });
        }

        let error = if !attempts.is_empty() && attempts.iter().all(|a| a.outcome.is_timeout()) {
            ProxyError::upstream_timeout(
                format!("全部 {} 个候选上游超时", attempts.len()),
                self.attempt_timeout.as_secs(),
            )
        } else {
            ProxyError::upstream_unavailable(format!("全部 {} 个候选上游不可用", attempts.len()))
        };
        Err(ResolutionFailure { error, attempts })
    }

    fn transport_outcome(err: &ProxyError) -> AttemptOutcome {
        let kind = match err {
            ProxyError::UpstreamTimeout { .. } => TransportFailure::Timeout,
            ProxyError::UpstreamTransport { .. } => TransportFailure::Connect,
            _ => TransportFailure::Io,
        };
        AttemptOutcome::TransportFailure {
            kind,
            message: err.to_string(),
        }
    }
}

/// 读完（有上限）并丢弃响应体，使连接可以回到连接池
async fn drain_body(response: UpstreamResponse) -> usize {
    let mut body = response.body;
    let mut drained = 0;
    let read_all = async {
        while let Some(Ok(chunk)) = body.next().await {
            drained += chunk.len();
            if drained > DRAIN_LIMIT {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, read_all).await;
    drained
}

/// 单元测试用的内存上游客户端
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 按 URL 返回预设结果的客户端
    #[derive(Default)]
    pub struct ScriptedClient {
        pub responses: HashMap<String, std::result::Result<(u16, &'static str), TransportFailure>>,
        pub calls: Mutex<Vec<UpstreamRequest>>,
    }

    #[async_trait]
    impl UpstreamClient for ScriptedClient {
        async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
            let scripted = self.responses.get(&request.url).cloned();
            self.calls.lock().unwrap().push(request);
            match scripted {
                Some(Ok((status, body))) => Ok(UpstreamResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: futures::stream::iter(vec![Ok(Bytes::from_static(body.as_bytes()))]).boxed(),
                }),
                Some(Err(TransportFailure::Timeout)) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProxyError::upstream_timeout("slow", 1))
                }
                Some(Err(_)) | None => Err(ProxyError::upstream_transport("connection refused")),
            }
        }
    }
}
