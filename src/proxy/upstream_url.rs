//! 上游地址解析工具
//!
//! 把镜像的 `base_url` 拆成 Pingora 需要的 `host:port`、`Host` 头与 SNI。

use crate::ensure;
use crate::error::{Result, config::ConfigError};
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpstreamAddress {
    pub addr: String,
    pub host_header: String,
    pub sni: String,
    pub tls: bool,
}

/// 解析上游地址，输出 Peer 地址与 Host/SNI
pub(crate) fn parse_upstream_address(url: &Url) -> Result<UpstreamAddress> {
    let tls = match url.scheme() {
        "https" => true,
        "http" => false,
        other => {
            return Err(ConfigError::InvalidUpstreamUrl {
                url: url.to_string(),
                message: format!("不支持的协议: {other}"),
            }
            .into());
        }
    };

    let host = url
        .host()
        .ok_or_else(|| ConfigError::Load(format!("上游地址缺少 host: {url}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConfigError::Load(format!("上游地址缺少端口: {url}")))?;
    ensure!(port != 0, ConfigError::Load(format!("上游端口无效: {url}")));

    let (host_display, sni) = match host {
        Host::Domain(domain) => (domain.to_string(), domain.to_string()),
        Host::Ipv4(ip) => (ip.to_string(), ip.to_string()),
        Host::Ipv6(ip) => (format!("[{ip}]"), ip.to_string()),
    };

    let addr = format!("{host_display}:{port}");
    let host_header = if url.port().is_some() {
        format!("{host_display}:{port}")
    } else {
        host_display
    };

    Ok(UpstreamAddress {
        addr,
        host_header,
        sni,
        tls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> UpstreamAddress {
        parse_upstream_address(&Url::parse(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_default_https_port() {
        let addr = parse("https://repo1.maven.org/maven2");
        assert_eq!(addr.addr, "repo1.maven.org:443");
        assert_eq!(addr.host_header, "repo1.maven.org");
        assert_eq!(addr.sni, "repo1.maven.org");
        assert!(addr.tls);
    }

    #[test]
    fn test_explicit_http_port() {
        let addr = parse("http://127.0.0.1:8081/repo");
        assert_eq!(addr.addr, "127.0.0.1:8081");
        assert_eq!(addr.host_header, "127.0.0.1:8081");
        assert!(!addr.tls);
    }

    #[test]
    fn test_ipv6_is_bracketed() {
        let addr = parse("http://[::1]:9000/");
        assert_eq!(addr.addr, "[::1]:9000");
        assert_eq!(addr.sni, "::1");
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(parse_upstream_address(&Url::parse("ftp://mirror.example.com/").unwrap()).is_err());
    }
}
