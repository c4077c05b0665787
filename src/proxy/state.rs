use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::proxy::client::{ReqwestUpstreamClient, UpstreamClient};
use crate::proxy::fallback::FallbackResolver;
use crate::proxy::router::RequestRouter;
use crate::proxy::upstream_service::UpstreamService;
use crate::registry::Registry;

/// 代理服务的共享状态
///
/// 启动时构建一次，之后只读，经 `Arc` 在请求间共享。
#[derive(Clone)]
pub struct ProxyState {
    config: Arc<AppConfig>,
    router: Arc<RequestRouter>,
    resolver: Arc<FallbackResolver>,
    upstream: UpstreamService,
    started_at: DateTime<Utc>,
}

impl ProxyState {
    /// 使用指定的上游客户端构建
    pub fn new(config: Arc<AppConfig>, client: Arc<dyn UpstreamClient>) -> Result<Self> {
        let registry = Arc::new(Registry::from_mirrors(&config.mirrors)?);
        let router = Arc::new(RequestRouter::new(registry, config.routing.heuristics)?);
        let resolver = Arc::new(FallbackResolver::new(
            client,
            config.upstream.timeout(),
            config.upstream.via.clone(),
        ));
        let upstream = UpstreamService::new(&config.upstream);

        Ok(Self {
            config,
            router,
            resolver,
            upstream,
            started_at: Utc::now(),
        })
    }

    /// 使用 reqwest 连接池构建
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let client = Arc::new(ReqwestUpstreamClient::new(&config.upstream)?);
        Self::new(config, client)
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub const fn router(&self) -> &Arc<RequestRouter> {
        &self.router
    }

    #[must_use]
    pub const fn resolver(&self) -> &Arc<FallbackResolver> {
        &self.resolver
    }

    #[must_use]
    pub const fn upstream(&self) -> &UpstreamService {
        &self.upstream
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
