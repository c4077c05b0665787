//! # 日志配置模块
//!
//! 结构化日志宏与 tracing 订阅器初始化。
//!
//! 所有事件都携带 `request_id`、`stage`、`component`、`operation` 四个字段，
//! 便于按请求串联整条代理链路。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    Configuration,
    RequestStart,
    Routing,
    UpstreamRequest,
    Fallback,
    Response,
    ResponseFailure,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::RequestStart => "request_start",
            Self::Routing => "routing",
            Self::UpstreamRequest => "upstream_request",
            Self::Fallback => "fallback",
            Self::Response => "response",
            Self::ResponseFailure => "response_failure",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    ServerSetup,
    Config,
    Router,
    Resolver,
    Relay,
    Upstream,
    Management,
    Proxy,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::Config => "config",
            Self::Router => "router",
            Self::Resolver => "resolver",
            Self::Relay => "relay",
            Self::Upstream => "upstream",
            Self::Management => "management",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($field:tt)+) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $description
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($field:tt)+) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $description
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($field:tt)+) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $description
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($field:tt)+) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $description
        )
    };
}

/// 默认过滤规则：应用自身 debug，依赖库只保留告警
fn default_filter(level: &str) -> String {
    format!("{level},repo_proxy={level},pingora_core=warn,pingora_proxy=warn,hyper=warn,reqwest=warn")
}

/// 初始化优化的日志系统
///
/// `RUST_LOG` 存在时优先生效；重复初始化会被忽略。
pub fn init_optimized_logging(log_level: Option<&String>) {
    let level = log_level.map_or("info", String::as_str);
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));

    let initialized = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tfmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .is_ok();

    if initialized {
        crate::ldebug!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "logging_initialized",
            "日志系统已初始化",
            filter = %log_filter
        );
    }
}
