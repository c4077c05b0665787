//! # 双端口服务器启动
//!
//! 代理端口由 Pingora 承载，管理端口由 axum 承载，两者共享同一个 `ProxyState`。

use crate::{
    config::AppConfig,
    error::{Context, Result},
    linfo,
    logging::{LogComponent, LogStage},
    management::server::{ManagementConfig, ManagementServer},
    proxy::{PingoraProxyServer, ProxyState},
};
use crate::lerror;
use std::sync::Arc;

/// 创建服务器实例
fn create_servers(config: &AppConfig, proxy_state: Arc<ProxyState>) -> Result<(ManagementServer, PingoraProxyServer)> {
    let management_config = ManagementConfig::from_app_config(config);

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "management_listen_info",
        "管理服务器监听地址",
        address = %format!("{}:{}", management_config.bind_address, management_config.port)
    );
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "proxy_listen_info",
        "代理服务器监听地址",
        address = %format!("{}:{}", config.dual_port.proxy.host, config.dual_port.proxy.port)
    );

    let management_server = ManagementServer::new(management_config, Arc::clone(&proxy_state))?;
    let proxy_server = PingoraProxyServer::new(proxy_state);

    Ok((management_server, proxy_server))
}

/// 处理 Ctrl+C 信号
async fn handle_ctrl_c_signal() -> String {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C signal".to_string(),
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                "监听 Ctrl+C 失败",
                error = %e
            );
            "Ctrl+C handler error".to_string()
        }
    }
}

/// 处理服务器任务退出结果
fn handle_task_result(server_name: &str, result: std::result::Result<Result<()>, tokio::task::JoinError>) -> String {
    match result {
        Ok(Err(e)) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_error",
                "服务器异常退出",
                server = server_name,
                error = %e
            );
            format!("{server_name} error")
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "server_panic",
                "服务器任务崩溃",
                server = server_name,
                error = %e
            );
            format!("{server_name} panic")
        }
        Ok(Ok(())) => format!("{server_name} exit"),
    }
}

/// 等待关闭信号（Ctrl+C 或服务器退出）
async fn await_shutdown_reason(
    management_task: &mut tokio::task::JoinHandle<Result<()>>,
    proxy_task: &mut tokio::task::JoinHandle<Result<()>>,
) -> String {
    tokio::select! {
        reason = handle_ctrl_c_signal() => reason,
        result = management_task => handle_task_result("Management server", result),
        result = proxy_task => handle_task_result("Proxy server", result),
    }
}

/// 运行双端口服务器，直到 Ctrl+C 或任一服务器退出
pub async fn run_dual_port_servers(config: Arc<AppConfig>) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "start_servers",
        "启动双端口服务器",
        mirrors = config.mirrors.len(),
        heuristics = config.routing.heuristics
    );

    let proxy_state = Arc::new(ProxyState::from_config(Arc::clone(&config)).context("构建代理状态失败")?);
    let (management_server, proxy_server) =
        create_servers(&config, proxy_state).context("创建服务器实例失败")?;

    let mut management_task = tokio::spawn(async move { management_server.serve().await });
    let mut proxy_task = tokio::spawn(async move { proxy_server.start().await });

    let shutdown_reason = await_shutdown_reason(&mut management_task, &mut proxy_task).await;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_initiated",
        "开始关闭",
        reason = %shutdown_reason
    );

    management_task.abort();
    proxy_task.abort();

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "servers_stopped",
        "所有服务器已停止"
    );

    Ok(())
}
