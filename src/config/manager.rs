//! # 配置管理器
//!
//! 统一的配置加载入口：配置文件、内置默认值与环境变量覆盖

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AppConfig, validate_config};
use crate::error::config::ConfigError;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 环境变量覆盖前缀
pub const ENV_PREFIX: &str = "REPO_PROXY_";

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "REPO_PROXY_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 配置来源文件，使用内置默认值时为 `None`
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    ///
    /// 路径优先级：显式参数、`REPO_PROXY_CONFIG_PATH`、`config/config.{RUST_ENV}.toml`。
    /// 显式指定的文件必须存在，默认路径缺失时回落到内置配置。
    pub fn load(explicit_path: Option<&Path>) -> crate::error::Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let default_path = PathBuf::from(format!("config/config.{env_name}.toml"));
        if default_path.exists() {
            return Self::from_file(default_path);
        }

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "builtin_config",
            "未找到配置文件，使用内置默认配置",
            default_path = %default_path.display()
        );
        Self::from_config(AppConfig::default(), None)
    }

    /// 从指定文件创建配置管理器
    pub fn from_file(config_path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let config_path = config_path.as_ref();
        let config = Self::load_config_file(config_path)?;
        Self::from_config(config, Some(config_path.to_path_buf()))
    }

    /// 应用环境变量覆盖并完成校验
    fn from_config(mut config: AppConfig, source: Option<PathBuf>) -> crate::error::Result<Self> {
        let applied = Self::apply_env_overrides(&mut config, env::vars())?;
        validate_config(&config)?;

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "配置加载完成",
            source = %source.as_deref().map_or_else(|| "builtin".to_string(), |p| p.display().to_string()),
            mirrors = config.mirrors.len(),
            env_overrides = applied
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn get_config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置来源文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> crate::error::Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::Load(format!("配置文件不存在: {}", path.display())).into());
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ProxyError::config_with_source(
                format!("读取配置文件失败: {}", path.display()),
                e,
            )
        })?;

        toml::from_str(&config_content).map_err(|e| {
            crate::error::ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}", path.display()),
                e,
            )
        })
    }

    /// 应用环境变量覆盖，返回生效的覆盖数量
    ///
    /// 例如 `REPO_PROXY_UPSTREAM_TIMEOUT_SECONDS=5` 对应 `upstream.timeout_seconds`。
    pub fn apply_env_overrides<I>(config: &mut AppConfig, vars: I) -> crate::error::Result<usize>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            let Some(config_key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if key == CONFIG_PATH_ENV {
                continue;
            }

            let path = config_key.to_lowercase();
            ldebug!(
                "system",
                LogStage::Configuration,
                LogComponent::Config,
                "env_override",
                "应用环境变量覆盖",
                path = %path,
                value = %value
            );
            if Self::apply_override_to_config(config, &path, &value)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// 将单个覆盖应用到配置对象，未知路径返回 `false`
    fn apply_override_to_config(
        config: &mut AppConfig,
        path: &str,
        value: &str,
    ) -> crate::error::Result<bool> {
        let parts: Vec<&str> = path.split('_').collect();

        match parts.as_slice() {
            ["proxy", "host"] => config.dual_port.proxy.host = value.to_string(),
            ["proxy", "port"] => config.dual_port.proxy.port = parse_value(path, value)?,
            ["management", "host"] => config.dual_port.management.host = value.to_string(),
            ["management", "port"] => {
                config.dual_port.management.port = parse_value(path, value)?;
            }
            ["upstream", "timeout", "seconds"] => {
                config.upstream.timeout_seconds = parse_value(path, value)?;
            }
            ["upstream", "connect", "timeout", "seconds"] => {
                config.upstream.connect_timeout_seconds = parse_value(path, value)?;
            }
            ["upstream", "pool", "max", "idle", "per", "host"] => {
                config.upstream.pool_max_idle_per_host = parse_value(path, value)?;
            }
            ["upstream", "via"] => config.upstream.via = value.to_string(),
            ["routing", "heuristics"] => config.routing.heuristics = parse_value(path, value)?,
            _ => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "unknown_env_override",
                    "未知的配置路径，忽略环境变量覆盖",
                    path = %path
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn parse_value<T>(path: &str, value: &str) -> crate::error::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        ConfigError::invalid(format!("{ENV_PREFIX}{}", path.to_uppercase()), format!("'{value}': {e}")).into()
    })
}
