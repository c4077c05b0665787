//! # 路由配置

use crate::management::handlers::{health_handler, info_handler, ping_handler};
use crate::management::server::AppState;
use axum::Router;
use axum::routing::get;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/ping", get(ping_handler))
        .with_state(state)
}
