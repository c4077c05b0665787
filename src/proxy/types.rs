//! # 代理类型定义
//!
//! 路由决策与上游尝试记录

use std::fmt;
use std::sync::Arc;

use crate::registry::MirrorEntry;

/// 单次请求的路由决策，计算一次后交给解析器消费
#[derive(Debug, Clone)]
pub enum RoutingDecision {
    /// 显式前缀命中，`path` 为去掉前缀后的剩余路径
    Explicit {
        mirror: Arc<MirrorEntry>,
        path: String,
    },
    /// 启发式分类得到唯一镜像，`path` 为原始路径
    Heuristic {
        mirror: Arc<MirrorEntry>,
        path: String,
    },
    /// 启发式分类只能确定类型，按顺序回退尝试全部候选
    HeuristicAmbiguous {
        candidates: Vec<Arc<MirrorEntry>>,
        path: String,
    },
    /// 无法路由
    Unresolved,
}

impl RoutingDecision {
    #[must_use]
    pub const fn kind(&self) -> RouteKind {
        match self {
            Self::Explicit { .. } => RouteKind::Explicit,
            Self::Heuristic { .. } => RouteKind::Heuristic,
            Self::HeuristicAmbiguous { .. } => RouteKind::Fallback,
            Self::Unresolved => RouteKind::Unresolved,
        }
    }

    /// 单一目标时返回 `(mirror, path)`
    #[must_use]
    pub fn single_target(&self) -> Option<(&Arc<MirrorEntry>, &str)> {
        match self {
            Self::Explicit { mirror, path } | Self::Heuristic { mirror, path } => {
                Some((mirror, path.as_str()))
            }
            _ => None,
        }
    }

    /// 按尝试顺序列出全部上游地址
    #[must_use]
    pub fn upstream_urls(&self, query: Option<&str>) -> Vec<String> {
        match self {
            Self::Explicit { mirror, path } | Self::Heuristic { mirror, path } => {
                vec![mirror.upstream_url(path, query)]
            }
            Self::HeuristicAmbiguous { candidates, path } => candidates
                .iter()
                .map(|mirror| mirror.upstream_url(path, query))
                .collect(),
            Self::Unresolved => Vec::new(),
        }
    }
}

/// 路由类别，用于日志与上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteKind {
    Explicit,
    Heuristic,
    Fallback,
    #[default]
    Unresolved,
}

impl RouteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Heuristic => "heuristic",
            Self::Fallback => "fallback",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 传输层失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// 超出单次尝试时限
    Timeout,
    /// 拒绝连接、DNS 失败、连接重置等
    Connect,
    /// 请求已发出但读写失败
    Io,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Io => "io",
        })
    }
}

/// 一次上游尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 状态码 < 400
    Success { status: u16 },
    /// 状态码 >= 400
    HttpError { status: u16 },
    /// 未拿到响应
    TransportFailure { kind: TransportFailure, message: String },
}

impl AttemptOutcome {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure {
                kind: TransportFailure::Timeout,
                ..
            }
        )
    }
}

/// 上游尝试记录
#[derive(Debug, Clone)]
pub struct UpstreamAttempt {
    pub mirror: Arc<MirrorEntry>,
    pub url: String,
    pub outcome: AttemptOutcome,
}
