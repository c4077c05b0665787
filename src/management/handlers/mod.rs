//! # 管理端处理器

pub mod system;

pub use system::{InfoResponse, MirrorInfo, health_handler, info_handler, ping_handler};
