//! # Repo Proxy 主程序
//!
//! 基于 Pingora 的统一仓库代理

use clap::Parser;
use repo_proxy::{
    Result,
    cli::Cli,
    dual_port_setup, lerror, linfo,
    logging::{self, LogComponent, LogStage},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    logging::init_optimized_logging(cli.log_level.as_ref());

    let config = match cli.load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Configuration,
                LogComponent::Main,
                "config_load_failed",
                "配置加载失败",
                error = %e
            );
            std::process::exit(2);
        }
    };

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        version = env!("CARGO_PKG_VERSION")
    );
    if let Err(e) = dual_port_setup::run_dual_port_servers(config).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            "服务启动失败",
            error = %e
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
