//! # 应用配置结构定义

use super::dual_port_config::DualPortServerConfig;
use super::mirrors::builtin_mirrors;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 应用主配置结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 双端口服务器配置
    #[serde(default)]
    pub dual_port: DualPortServerConfig,
    /// 上游请求配置
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 路由配置
    #[serde(default)]
    pub routing: RoutingConfig,
    /// 镜像列表，顺序有意义
    #[serde(default = "builtin_mirrors")]
    pub mirrors: Vec<MirrorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dual_port: DualPortServerConfig::default(),
            upstream: UpstreamConfig::default(),
            routing: RoutingConfig::default(),
            mirrors: builtin_mirrors(),
        }
    }
}

/// 上游请求配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 单次上游请求超时（秒）
    pub timeout_seconds: u64,
    /// 建连超时（秒）
    pub connect_timeout_seconds: u64,
    /// 每个上游主机保留的空闲连接数
    pub pool_max_idle_per_host: usize,
    /// 追加到 `Via` 头的值
    pub via: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            pool_max_idle_per_host: 32,
            via: "1.1 repo-proxy".to_string(),
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// 路由配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// 是否对无前缀路径做启发式分类
    pub heuristics: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { heuristics: true }
    }
}

/// 单个镜像配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// 仓库类型，例如 `maven`
    #[serde(rename = "type")]
    pub repo_type: String,
    /// 镜像键，例如 `central`
    pub key: String,
    /// 上游基础地址
    pub url: String,
}
