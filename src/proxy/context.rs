//! # 代理上下文模块
//!
//! 单个请求在各个 Pingora 阶段之间传递的状态

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::proxy::types::{RouteKind, UpstreamAttempt};
use crate::registry::MirrorEntry;

/// 单一目标请求的上游信息
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// 目标镜像
    pub mirror: Arc<MirrorEntry>,
    /// 发往上游的路径与查询串
    pub path_and_query: String,
}

/// 请求上下文
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// 请求ID
    pub request_id: String,
    /// 开始时间
    pub start_time: Instant,
    /// 路由类别
    pub route_kind: RouteKind,
    /// 单一目标（显式前缀或唯一分类结果）
    pub target: Option<UpstreamTarget>,
    /// 回退尝试记录
    pub attempts: Vec<UpstreamAttempt>,
    /// 发给客户端的状态码
    pub status: Option<u16>,
    /// 已转发的响应体字节数
    pub bytes_sent: u64,
    /// 请求级取消信号，客户端断开或请求结束时触发
    pub cancel: CancellationToken,
}

impl Default for ProxyContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            route_kind: RouteKind::default(),
            target: None,
            attempts: Vec::new(),
            status: None,
            bytes_sent: 0,
            cancel: CancellationToken::new(),
        }
    }
}

impl ProxyContext {
    /// 最终选中的上游地址
    #[must_use]
    pub fn upstream_url(&self) -> Option<String> {
        if let Some(target) = &self.target {
            return Some(format!("{}{}", target.mirror.origin(), target.path_and_query));
        }
        self.attempts.last().map(|attempt| attempt.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RepositoryType;

    #[test]
    fn test_each_context_has_unique_id() {
        let a = ProxyContext::default();
        let b = ProxyContext::default();
        assert_ne!(a.request_id, b.request_id);
        assert!(!a.cancel.is_cancelled());
        assert!(a.upstream_url().is_none());
    }

    #[test]
    fn test_upstream_url_from_target() {
        let mirror = Arc::new(
            MirrorEntry::new(RepositoryType::NPM, "official", "https://registry.npmjs.org").unwrap(),
        );
        let ctx = ProxyContext {
            target: Some(UpstreamTarget {
                mirror,
                path_and_query: "/lodash?write=true".to_string(),
            }),
            ..ProxyContext::default()
        };
        assert_eq!(
            ctx.upstream_url().as_deref(),
            Some("https://registry.npmjs.org/lodash?write=true")
        );
    }
}
