//! # Pingora 代理服务器
//!
//! 仓库代理端口的 Pingora 服务器封装

use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::proxy::service::ProxyService;
use crate::proxy::state::ProxyState;
use pingora_core::server::{Server, configuration::Opt};
use pingora_proxy::http_proxy_service;
use std::sync::Arc;

/// Pingora 代理服务器
pub struct PingoraProxyServer {
    state: Arc<ProxyState>,
}

impl PingoraProxyServer {
    /// 创建新的代理服务器
    #[must_use]
    pub const fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    /// 创建Pingora服务器选项（基本配置）
    fn create_pingora_options() -> Opt {
        Opt {
            daemon: false,   // 在前台运行
            upgrade: false,  // 不支持在线升级
            nocapture: true, // 不捕获标准输出/错误
            ..Opt::default()
        }
    }

    /// 获取代理服务器监听地址
    #[must_use]
    pub fn get_server_address(&self) -> String {
        let config = self.state.config();
        format!("{}:{}", config.dual_port.proxy.host, config.dual_port.proxy.port)
    }

    /// 构建已完成引导并挂载代理服务的 Pingora 服务器
    pub fn build_server(&self) -> Result<Server> {
        let opt = Self::create_pingora_options();
        let mut server = Server::new(Some(opt))
            .map_err(|e| ProxyError::server_init_with_source("创建Pingora服务器失败", e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "bootstrapping_server",
            "启动Pingora服务器引导"
        );
        server.bootstrap();

        let proxy_service = ProxyService::new(Arc::clone(&self.state));
        let mut http_service = http_proxy_service(&server.configuration, proxy_service);

        let server_address = self.get_server_address();
        http_service.add_tcp(&server_address);
        server.add_service(http_service);

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "starting_server",
            "启动Pingora代理服务器",
            address = %server_address,
            mirrors = self.state.router().registry().len()
        );
        Ok(server)
    }

    /// 启动服务器，阻塞直到 Pingora 退出
    pub async fn start(self) -> Result<()> {
        let server = self.build_server()?;
        tokio::task::spawn_blocking(move || {
            server.run_forever();
        })
        .await
        .map_err(|e| ProxyError::server_start_with_source("Pingora服务器任务异常退出", e))
    }
}
