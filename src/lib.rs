//! # Repo Proxy Library
//!
//! Maven、PyPI、NPM、Go 与 APT 仓库的统一反向代理核心库

pub mod cli;
pub mod config;
pub mod dual_port_setup;
pub mod error;
pub mod logging;
pub mod management;
pub mod proxy;
pub mod registry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
