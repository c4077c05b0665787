//! # 管理API模块
//!
//! 管理端口上的健康检查与运行信息查询

pub mod handlers;
pub mod routes;
pub mod server;

pub use routes::create_routes;
pub use server::{AppState, ManagementConfig, ManagementServer};
