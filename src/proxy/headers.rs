//! # 请求与响应头处理
//!
//! 请求方向只转发白名单中的头并追加 `Via`；响应方向剔除逐跳头并注入 CORS 头。

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// 逐跳头，任何方向都不得转发
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// 转发给上游的请求头白名单
pub const FORWARDED_REQUEST_HEADERS: &[&str] = &[
    "range",
    "if-none-match",
    "if-modified-since",
    "accept",
    "user-agent",
    "authorization",
    "accept-encoding",
];

pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";
pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_HEADERS: &str = "*";
pub const CORS_MAX_AGE: &str = "86400";

#[must_use]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[must_use]
pub fn is_forwardable_request_header(name: &str) -> bool {
    FORWARDED_REQUEST_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// 需要从响应中剔除的头：固定逐跳头加上 `Connection` 中列出的头
#[must_use]
pub fn hop_by_hop_names(headers: &HeaderMap) -> Vec<HeaderName> {
    let mut names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name.as_str()))
        .cloned()
        .collect();

    for value in headers.get_all(header::CONNECTION) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Ok(name) = HeaderName::from_bytes(token.to_ascii_lowercase().as_bytes())
                && headers.contains_key(&name)
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
    }
    names
}

/// 请求方向保留的头：白名单加上已有的 `Via`
fn is_retained_request_header(name: &HeaderName) -> bool {
    *name == header::VIA || is_forwardable_request_header(name.as_str())
}

/// 请求中需要剔除的头名
#[must_use]
pub fn dropped_request_headers(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .keys()
        .filter(|name| !is_retained_request_header(name))
        .cloned()
        .collect()
}

/// 按白名单复制请求头，并在已有 `Via` 之后追加本代理
#[must_use]
pub fn forwardable_request_headers(source: &HeaderMap, via: &str) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in source {
        if is_retained_request_header(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    if let Ok(value) = HeaderValue::from_str(via) {
        forwarded.append(header::VIA, value);
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_request_whitelist() {
        let source = map(&[
            ("host", "proxy.local"),
            ("cookie", "session=1"),
            ("x-custom", "1"),
            ("range", "bytes=0-10"),
            ("user-agent", "maven/3.9"),
            ("authorization", "Basic abc"),
            ("connection", "keep-alive"),
        ]);

        let forwarded = forwardable_request_headers(&source, "1.1 repo-proxy");

        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("cookie").is_none());
        assert!(forwarded.get("x-custom").is_none());
        assert!(forwarded.get("connection").is_none());
        assert_eq!(forwarded["range"], "bytes=0-10");
        assert_eq!(forwarded["user-agent"], "maven/3.9");
        assert_eq!(forwarded["authorization"], "Basic abc");
    }

    #[test]
    fn test_dropped_request_headers_keep_via() {
        let source = map(&[
            ("host", "proxy.local"),
            ("cookie", "session=1"),
            ("accept", "*/*"),
            ("via", "1.1 corporate-proxy"),
        ]);
        let names = dropped_request_headers(&source);
        let mut dropped: Vec<&str> = names.iter().map(HeaderName::as_str).collect();
        dropped.sort_unstable();
        assert_eq!(dropped, vec!["cookie", "host"]);
    }

    #[test]
    fn test_via_is_appended_not_replaced() {
        let source = map(&[("via", "1.1 corporate-proxy")]);
        let forwarded = forwardable_request_headers(&source, "1.1 repo-proxy");
        let vias: Vec<&str> = forwarded
            .get_all("via")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(vias, vec!["1.1 corporate-proxy", "1.1 repo-proxy"]);
    }

    #[test]
    fn test_strip_hop_by_hop_and_connection_listed() {
        let mut headers = map(&[
            ("connection", "close, x-trace-hop"),
            ("keep-alive", "timeout=5"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "h2c"),
            ("x-trace-hop", "abc"),
            ("content-type", "application/java-archive"),
            ("etag", "\"v1\""),
        ]);

        for name in hop_by_hop_names(&headers) {
            headers.remove(&name);
        }

        let mut remaining: Vec<&str> = headers.keys().map(HeaderName::as_str).collect();
        remaining.sort_unstable();
        assert_eq!(remaining, vec!["content-type", "etag"]);
    }

    #[test]
    fn test_is_hop_by_hop_ignores_case() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(!is_hop_by_hop("content-length"));
    }
}
