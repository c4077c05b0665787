//! # 上游服务模块
//!
//! 负责单一目标请求的上游节点（Peer）构造与连接参数配置。

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::proxy::context::UpstreamTarget;
use crate::proxy::upstream_url::{UpstreamAddress, parse_upstream_address};
use pingora_core::upstreams::peer::{ALPN, HttpPeer, Peer};
use std::time::Duration;

/// 上游服务
#[derive(Debug, Clone)]
pub struct UpstreamService {
    connect_timeout: Duration,
    timeout: Duration,
}

impl UpstreamService {
    /// 创建新的上游服务
    #[must_use]
    pub const fn new(config: &UpstreamConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
        }
    }

    /// 解析目标镜像的连接地址
    pub(crate) fn address(target: &UpstreamTarget) -> Result<UpstreamAddress> {
        parse_upstream_address(target.mirror.base_url())
    }

    /// 构造上游对等体
    ///
    /// 先异步解析 DNS，解析失败作为上游传输错误返回。
    pub async fn select_peer(&self, request_id: &str, target: &UpstreamTarget) -> Result<Box<HttpPeer>> {
        let address = Self::address(target)?;
        let socket_addr = tokio::net::lookup_host(address.addr.as_str())
            .await
            .map_err(|e| ProxyError::upstream_transport_with_source(format!("解析上游地址失败: {}", address.addr), e))?
            .next()
            .ok_or_else(|| ProxyError::upstream_transport(format!("上游地址无可用解析结果: {}", address.addr)))?;
        let mut peer = HttpPeer::new(socket_addr, address.tls, address.sni.clone());

        if let Some(options) = peer.get_mut_peer_options() {
            options.alpn = ALPN::H1;
            options.connection_timeout = Some(self.connect_timeout);
            options.total_connection_timeout = Some(self.connect_timeout + Duration::from_secs(5));
            options.read_timeout = Some(self.timeout);
            options.write_timeout = Some(self.timeout);
        }

        linfo!(
            request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "upstream_peer_selected",
            "上游节点选择完成",
            mirror = %target.mirror.prefix(),
            upstream = %address.addr,
            tls = address.tls,
            timeout_seconds = self.timeout.as_secs()
        );

        Ok(Box::new(peer))
    }
}
