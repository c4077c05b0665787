//! # 双端口架构配置
//!
//! 代理端口承载仓库流量，管理端口承载健康检查与信息查询

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// 双端口服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualPortServerConfig {
    /// 管理服务监听配置
    #[serde(default = "ListenerConfig::default_management")]
    pub management: ListenerConfig,
    /// 代理服务监听配置
    #[serde(default = "ListenerConfig::default_proxy")]
    pub proxy: ListenerConfig,
}

/// 监听器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for DualPortServerConfig {
    fn default() -> Self {
        Self {
            management: ListenerConfig::default_management(),
            proxy: ListenerConfig::default_proxy(),
        }
    }
}

impl ListenerConfig {
    fn default_management() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }

    fn default_proxy() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }

    /// 获取绑定地址
    pub fn bind_address(&self) -> std::io::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid address '{addr}': {e}"),
            )
        })
    }
}

impl DualPortServerConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        let mgmt_port = self.management.port;
        let proxy_port = self.proxy.port;

        if mgmt_port == 0 || proxy_port == 0 {
            return Err("Listener port must be greater than 0".to_string());
        }

        if mgmt_port == proxy_port {
            return Err(format!(
                "Management port ({mgmt_port}) conflicts with proxy port ({proxy_port})"
            ));
        }

        self.management
            .bind_address()
            .map_err(|e| format!("Invalid management address: {e}"))?;

        self.proxy
            .bind_address()
            .map_err(|e| format!("Invalid proxy address: {e}"))?;

        Ok(())
    }

    /// 获取所有监听地址
    pub fn get_all_listeners(&self) -> Vec<(String, SocketAddr)> {
        let mut listeners = Vec::new();

        if let Ok(addr) = self.management.bind_address() {
            listeners.push(("management-http".to_string(), addr));
        }

        if let Ok(addr) = self.proxy.bind_address() {
            listeners.push(("proxy-http".to_string(), addr));
        }

        listeners
    }
}
