//! # 命令行参数
//!
//! 命令行参数优先于配置文件与环境变量。

use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, ConfigManager, validate_config};
use crate::error::Result;

/// Maven / PyPI / NPM / Go / APT 统一仓库代理
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "repo-proxy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, env = "REPO_PROXY_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// 代理端口监听地址
    #[arg(long)]
    pub host: Option<String>,

    /// 代理端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 管理端口
    #[arg(long)]
    pub management_port: Option<u16>,

    /// 日志级别（trace/debug/info/warn/error），`RUST_LOG` 优先
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// 把命令行参数覆盖到配置上
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.dual_port.proxy.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.dual_port.proxy.port = port;
        }
        if let Some(port) = self.management_port {
            config.dual_port.management.port = port;
        }
    }

    /// 加载配置、覆盖命令行参数并重新校验
    pub fn load_config(&self) -> Result<AppConfig> {
        let manager = ConfigManager::load(self.config.as_deref())?;
        let mut config = (*manager.get_config()).clone();
        self.apply(&mut config);
        validate_config(&config)?;
        Ok(config)
    }
}
