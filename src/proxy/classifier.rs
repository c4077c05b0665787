//! # 启发式分类器
//!
//! 根据无前缀路径的形状推断仓库类型。规则按顺序匹配，首个命中生效；
//! 比较前统一转为小写，查询串不参与匹配。结果是尽力而为的猜测。

use regex::Regex;

use crate::error::{ProxyError, Result};
use crate::registry::RepositoryType;

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Maven 路径无法确定具体镜像，需要回退尝试
    Maven,
    /// 确定到具体的类型与镜像键
    Repository {
        repo_type: RepositoryType,
        repo_key: &'static str,
    },
}

impl Classification {
    const fn repository(repo_type: RepositoryType, repo_key: &'static str) -> Self {
        Self::Repository {
            repo_type,
            repo_key,
        }
    }
}

/// 启发式分类器
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    maven_artifact: Regex,
    maven_metadata: Regex,
    maven_layout: Regex,
    npm_scoped: Regex,
    npm_bare: Regex,
}

impl HeuristicClassifier {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ProxyError::internal_with_source(format!("分类规则编译失败: {pattern}"), e))
        };

        Ok(Self {
            maven_artifact: compile(
                r"\.(jar|pom|aar|zip|war|ear|module|sources\.jar|javadoc\.jar)(\.(asc|sha1|md5))?$",
            )?,
            maven_metadata: compile(r"/maven-metadata\.xml(\.(asc|sha1|md5))?$")?,
            maven_layout: compile(r"^(/[a-z0-9._-]+){2,}/[0-9][a-z0-9._-]*/")?,
            npm_scoped: compile(r"^/@[a-z0-9._-]+(/|%2f)[a-z0-9._-]+")?,
            npm_bare: compile(r"^/[^/]*-[^/]*/?$")?,
        })
    }

    /// 对路径分类，不匹配任何规则时返回 `None`
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<Classification> {
        let path = path.to_ascii_lowercase();

        if self.is_maven(&path) {
            return Some(Classification::Maven);
        }
        if path.contains("/simple/") {
            return Some(Classification::repository(RepositoryType::PYPI, "official"));
        }
        if self.is_npm(&path) {
            return Some(Classification::repository(RepositoryType::NPM, "official"));
        }
        if path.contains("/@v/") || path.contains("/@latest") || path.starts_with("/mod/") {
            return Some(Classification::repository(RepositoryType::GO, "official"));
        }
        if path.contains("/dists/") || path.contains("/pool/") || path.ends_with(".deb") {
            return Some(Classification::repository(RepositoryType::APT, "ubuntu"));
        }
        None
    }

    fn is_maven(&self, path: &str) -> bool {
        self.maven_artifact.is_match(path)
            || self.maven_metadata.is_match(path)
            || self.maven_layout.is_match(path)
            || path.contains("/maven2/")
    }

    fn is_npm(&self, path: &str) -> bool {
        path.contains("/-/")
            || path.contains("/package/")
            || self.npm_scoped.is_match(path)
            || self.npm_bare.is_match(path)
    }
}
