//! # 错误类型定义

use super::ErrorCategory;
use super::config::ConfigError;
use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 不支持的请求方法
    #[error("不支持的请求方法: {method}")]
    MethodNotAllowed { method: String },

    /// 既没有显式前缀也无法推断仓库类型
    #[error("无法路由的路径: {path}")]
    NoRoute { path: String },

    /// 请求路径包含目录穿越片段
    #[error("非法请求路径: {path}")]
    InvalidPath { path: String },

    /// 推断出的仓库类型没有配置对应的镜像
    #[error("未配置镜像: {repo_type}/{}", repo_key.as_deref().unwrap_or("*"))]
    UnknownMirror {
        repo_type: String,
        repo_key: Option<String>,
    },

    /// 上游返回了 >= 400 的状态码
    #[error("上游返回错误状态 {status}: {url}")]
    UpstreamStatus { status: u16, url: String },

    /// 上游连接失败（拒绝连接、DNS 失败、连接重置）
    #[error("上游传输失败: {message}")]
    UpstreamTransport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游请求超时
    #[error("上游请求超时: {message}")]
    UpstreamTimeout {
        message: String,
        timeout_seconds: u64,
    },

    /// 所有候选上游均不可用
    #[error("上游服务器不可用: {message}")]
    UpstreamUnavailable { message: String },

    /// 响应头已发送后的流式传输失败
    #[error("流式传输中断: {message}")]
    MidStream {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器初始化错误
    #[error("服务器初始化错误: {message}")]
    ServerInit {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ProxyError>,
    },
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "BAD_METHOD"),
            Self::NoRoute { .. } => (StatusCode::NOT_FOUND, "NO_ROUTE"),
            Self::InvalidPath { .. } => (StatusCode::BAD_REQUEST, "INVALID_PATH"),
            Self::UnknownMirror { .. } => (StatusCode::BAD_GATEWAY, "UNKNOWN_MIRROR"),
            Self::UpstreamStatus { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "UPSTREAM_HTTP_ERROR",
            ),
            Self::UpstreamTransport { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_TRANSPORT_ERROR"),
            Self::UpstreamTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
            Self::UpstreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            Self::MidStream { .. } => (StatusCode::BAD_GATEWAY, "MID_STREAM_FAILURE"),
            Self::ServerInit { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_INIT_ERROR"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// HTTP 状态码的数值形式
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.to_http_response_parts().0.as_u16()
    }

    /// 错误归类，用于日志级别选择
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_client_error() {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建方法不允许错误
    pub fn method_not_allowed<T: Into<String>>(method: T) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
        }
    }

    /// 创建无路由错误
    pub fn no_route<T: Into<String>>(path: T) -> Self {
        Self::NoRoute { path: path.into() }
    }

    /// 创建非法路径错误
    pub fn invalid_path<T: Into<String>>(path: T) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// 创建未配置镜像错误
    pub fn unknown_mirror<T: Into<String>>(repo_type: T, repo_key: Option<&str>) -> Self {
        Self::UnknownMirror {
            repo_type: repo_type.into(),
            repo_key: repo_key.map(str::to_string),
        }
    }

    /// 创建上游传输错误
    pub fn upstream_transport<T: Into<String>>(message: T) -> Self {
        Self::UpstreamTransport {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的上游传输错误
    pub fn upstream_transport_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::UpstreamTransport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建上游超时错误
    pub fn upstream_timeout<T: Into<String>>(message: T, timeout_seconds: u64) -> Self {
        Self::UpstreamTimeout {
            message: message.into(),
            timeout_seconds,
        }
    }

    /// 创建上游不可用错误
    pub fn upstream_unavailable<T: Into<String>>(message: T) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// 创建带来源的流式中断错误
    pub fn mid_stream_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::MidStream {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建流式中断错误
    pub fn mid_stream<T: Into<String>>(message: T) -> Self {
        Self::MidStream {
            message: message.into(),
            source: None,
        }
    }

    /// 创建服务器初始化错误
    pub fn server_init<T: Into<String>>(message: T) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的服务器初始化错误
    pub fn server_init_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ProxyError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<ConfigError> for ProxyError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source("URL解析失败", err)
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON处理失败", err)
    }
}

// Reqwest错误转换
impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        Self::upstream_transport_with_source("HTTP请求失败", err)
    }
}

// Pingora错误转换
impl From<Box<pingora_core::Error>> for ProxyError {
    fn from(err: Box<pingora_core::Error>) -> Self {
        Self::upstream_transport_with_source("Pingora操作失败", err)
    }
}
