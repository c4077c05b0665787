//! # 管理服务器
//!
//! Axum HTTP服务器，提供健康检查与运行信息

use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::proxy::ProxyState;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 管理服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementConfig {
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 是否启用CORS
    pub enable_cors: bool,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9090,
            enable_cors: true,
        }
    }
}

impl ManagementConfig {
    /// 从应用配置的管理端监听项构造
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            bind_address: config.dual_port.management.host.clone(),
            port: config.dual_port.management.port,
            ..Self::default()
        }
    }

    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self.bind_address.parse::<std::net::IpAddr>().map_err(|e| {
            ProxyError::config_with_source(
                format!("Invalid management bind address '{}'", self.bind_address),
                e,
            )
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    proxy: Arc<ProxyState>,
}

impl AppState {
    #[must_use]
    pub const fn new(proxy: Arc<ProxyState>) -> Self {
        Self { proxy }
    }

    #[must_use]
    pub const fn proxy(&self) -> &Arc<ProxyState> {
        &self.proxy
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ManagementConfig,
    router: Router,
}

impl ManagementServer {
    /// 创建新的管理服务器
    pub fn new(config: ManagementConfig, proxy: Arc<ProxyState>) -> Result<Self> {
        config.socket_addr()?;
        let router = Self::create_router(AppState::new(proxy), &config);
        Ok(Self { config, router })
    }

    /// 创建路由器
    pub fn create_router(state: AppState, config: &ManagementConfig) -> Router {
        let app = super::routes::create_routes(state);
        let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());

        if config.enable_cors {
            let cors_layer = CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
                .allow_headers(Any)
                .allow_origin(Any);
            app.layer(service_builder.layer(cors_layer))
        } else {
            app.layer(service_builder)
        }
    }

    /// 路由器副本，供测试直接驱动
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 启动服务器
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.socket_addr()?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Management,
            "server_start",
            "启动管理服务器",
            address = %addr
        );

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ProxyError::server_start_with_source(format!("绑定管理端口失败: {addr}"), e))?;

        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|e| ProxyError::server_start_with_source("管理服务器异常退出", e))?;

        Ok(())
    }

    /// 获取绑定地址
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.config.socket_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_app_config() {
        let mut app = AppConfig::default();
        app.dual_port.management.port = 19090;

        let config = ManagementConfig::from_app_config(&app);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.socket_addr().unwrap().port(), 19090);
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let config = ManagementConfig {
            bind_address: "not-an-ip".to_string(),
            ..ManagementConfig::default()
        };
        assert!(matches!(config.socket_addr(), Err(ProxyError::Config { .. })));
    }
}
