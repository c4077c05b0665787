//! # Pingora 代理服务模块
//!
//! 仓库请求的路由、回退解析与响应中继

pub mod classifier;
pub mod client;
pub mod context;
pub mod fallback;
pub mod headers;
pub mod pingora_proxy;
pub mod relay;
pub mod response;
pub mod router;
pub mod service;
pub mod state;
pub mod types;
pub mod upstream_service;
pub(crate) mod upstream_url;

pub use classifier::{Classification, HeuristicClassifier};
pub use client::{ReqwestUpstreamClient, UpstreamClient, UpstreamRequest, UpstreamResponse};
pub use context::{ProxyContext, UpstreamTarget};
pub use fallback::{FallbackRequest, FallbackResolver, Resolution, ResolutionFailure};
pub use pingora_proxy::PingoraProxyServer;
pub use relay::{RelayStats, ResponseSink, relay_response};
pub use router::{PrefixRouter, RequestRouter};
pub use service::ProxyService;
pub use state::ProxyState;
pub use types::{AttemptOutcome, RouteKind, RoutingDecision, TransportFailure, UpstreamAttempt};
pub use upstream_service::UpstreamService;
