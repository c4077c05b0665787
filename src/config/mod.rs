//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod dual_port_config;
mod manager;
mod mirrors;

pub use app_config::{AppConfig, MirrorConfig, RoutingConfig, UpstreamConfig};
pub use dual_port_config::{DualPortServerConfig, ListenerConfig};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ENV_PREFIX};
pub use mirrors::builtin_mirrors;

use crate::error::ConfigResult;
use crate::error::config::ConfigError;
use std::collections::HashSet;
use url::Url;

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> ConfigResult<()> {
    config
        .dual_port
        .validate()
        .map_err(|message| ConfigError::invalid("dual_port", message))?;

    if config.upstream.timeout_seconds == 0 {
        return Err(ConfigError::invalid(
            "upstream.timeout_seconds",
            "超时时间必须大于0",
        ));
    }

    if config.upstream.connect_timeout_seconds == 0 {
        return Err(ConfigError::invalid(
            "upstream.connect_timeout_seconds",
            "建连超时必须大于0",
        ));
    }

    if config.upstream.via.trim().is_empty() {
        return Err(ConfigError::invalid("upstream.via", "Via 头不能为空"));
    }

    let mut seen = HashSet::new();
    for mirror in &config.mirrors {
        validate_identifier("mirrors.type", &mirror.repo_type)?;
        validate_identifier("mirrors.key", &mirror.key)?;
        validate_upstream_url(&mirror.url)?;

        if !seen.insert((mirror.repo_type.as_str(), mirror.key.as_str())) {
            return Err(ConfigError::DuplicateMirror {
                repo_type: mirror.repo_type.clone(),
                repo_key: mirror.key.clone(),
            });
        }
    }

    Ok(())
}

/// 类型与镜像键只允许小写字母、数字和 `.`、`-`、`_`
fn validate_identifier(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::invalid(field, "不能为空"));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'));
    if !valid {
        return Err(ConfigError::invalid(
            field,
            format!("'{value}' 只能包含小写字母、数字和 . - _"),
        ));
    }
    Ok(())
}

/// 上游地址必须是不带查询串和片段的绝对 http(s) 地址
pub fn validate_upstream_url(raw: &str) -> ConfigResult<Url> {
    let invalid = |message: &str| ConfigError::InvalidUpstreamUrl {
        url: raw.to_string(),
        message: message.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("仅支持 http 和 https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("缺少主机名"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("不能包含查询串或片段"));
    }
    Ok(url)
}
