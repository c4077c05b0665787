//! # 镜像条目

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use url::Url;

use crate::error::ConfigResult;

/// 仓库类型标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepositoryType(Cow<'static, str>);

impl RepositoryType {
    pub const MAVEN: Self = Self(Cow::Borrowed("maven"));
    pub const PYPI: Self = Self(Cow::Borrowed("pypi"));
    pub const NPM: Self = Self(Cow::Borrowed("npm"));
    pub const GO: Self = Self(Cow::Borrowed("go"));
    pub const APT: Self = Self(Cow::Borrowed("apt"));

    /// 由配置中的标识构造
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一个上游镜像：`(type, repoKey, upstreamBaseURL)`
///
/// `origin` 为 scheme+host+port，`base_path` 去掉了结尾的 `/`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    repo_type: RepositoryType,
    repo_key: String,
    base_url: Url,
    origin: String,
    base_path: String,
    prefix: String,
}

impl MirrorEntry {
    /// 校验上游地址并拆分出 origin 与 base path
    pub fn new(repo_type: RepositoryType, repo_key: impl Into<String>, url: &str) -> ConfigResult<Self> {
        let base_url = crate::config::validate_upstream_url(url)?;
        let repo_key = repo_key.into();

        let origin = base_url.origin().ascii_serialization();
        let base_path = base_url.path().trim_end_matches('/').to_string();
        let prefix = format!("/{repo_type}/{repo_key}/");

        Ok(Self {
            repo_type,
            repo_key,
            base_url,
            origin,
            base_path,
            prefix,
        })
    }

    #[must_use]
    pub const fn repo_type(&self) -> &RepositoryType {
        &self.repo_type
    }

    #[must_use]
    pub fn repo_key(&self) -> &str {
        &self.repo_key
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// 显式前缀 `/type/repoKey/`
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 上游请求路径：`basePath + path (+ ?query)`
    ///
    /// `path` 必须以 `/` 开头。
    #[must_use]
    pub fn upstream_path(&self, path: &str, query: Option<&str>) -> String {
        let mut target = String::with_capacity(self.base_path.len() + path.len() + 16);
        target.push_str(&self.base_path);
        target.push_str(path);
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// 完整上游地址：`origin + basePath + path (+ ?query)`
    #[must_use]
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        format!("{}{}", self.origin, self.upstream_path(path, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_and_base_path() {
        let entry =
            MirrorEntry::new(RepositoryType::PYPI, "official", "https://pypi.org/pypi/web/simple/").unwrap();

        assert_eq!(entry.origin(), "https://pypi.org");
        assert_eq!(entry.base_path(), "/pypi/web/simple");
        assert_eq!(entry.prefix(), "/pypi/official/");
        assert_eq!(
            entry.upstream_url("/simple/requests/", None),
            "https://pypi.org/pypi/web/simple/simple/requests/"
        );
    }

    #[test]
    fn test_root_base_path_is_empty() {
        let entry = MirrorEntry::new(RepositoryType::NPM, "official", "https://registry.npmjs.org").unwrap();
        assert_eq!(entry.base_path(), "");
        assert_eq!(entry.upstream_path("/lodash", Some("a=1")), "/lodash?a=1");
    }

    #[test]
    fn test_explicit_port_is_kept() {
        let entry = MirrorEntry::new(RepositoryType::new("maven"), "local", "http://127.0.0.1:8081/repo").unwrap();

        assert_eq!(entry.origin(), "http://127.0.0.1:8081");
        assert_eq!(entry.upstream_url("/a.pom", None), "http://127.0.0.1:8081/repo/a.pom");
    }

    #[test]
    fn test_constants_equal_owned_names() {
        assert_eq!(RepositoryType::MAVEN, RepositoryType::new("maven"));
    }
}
