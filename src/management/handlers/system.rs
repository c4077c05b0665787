//! # 系统信息处理器

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::management::server::AppState;

/// 单个镜像的对外描述
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MirrorInfo {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub key: String,
    pub upstream: String,
    pub prefix: String,
}

/// `/info` 响应
#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub heuristics: bool,
    pub upstream_timeout_seconds: u64,
    /// 按注册顺序
    pub mirrors: Vec<MirrorInfo>,
}

/// 健康检查
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 运行配置与镜像列表
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    let proxy = state.proxy();
    let config = proxy.config();
    let mirrors = proxy
        .router()
        .registry()
        .iter()
        .map(|mirror| MirrorInfo {
            repo_type: mirror.repo_type().to_string(),
            key: mirror.repo_key().to_string(),
            upstream: format!("{}{}", mirror.origin(), mirror.base_path()),
            prefix: mirror.prefix().to_string(),
        })
        .collect();

    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        started_at: proxy.started_at(),
        heuristics: config.routing.heuristics,
        upstream_timeout_seconds: config.upstream.timeout_seconds,
        mirrors,
    })
}

/// Ping 处理器
pub async fn ping_handler() -> &'static str {
    "pong"
}
