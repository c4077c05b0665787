//! # 路由系统
//!
//! 显式前缀路由优先，其次是启发式分类。前缀表在启动时由注册表派生，运行期只读。

use std::sync::Arc;

use crate::error::{ProxyError, Result};
use crate::proxy::classifier::{Classification, HeuristicClassifier};
use crate::proxy::types::RoutingDecision;
use crate::registry::{MirrorEntry, Registry, RepositoryType};

/// 显式前缀路由 `/type/repoKey/ -> MirrorEntry`
#[derive(Debug, Clone)]
pub struct PrefixRoute {
    prefix: String,
    mirror: Arc<MirrorEntry>,
}

impl PrefixRoute {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub const fn mirror(&self) -> &Arc<MirrorEntry> {
        &self.mirror
    }

    /// 命中时返回剩余路径（保留开头的 `/`）
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if let Some(rest) = path.strip_prefix(self.prefix.as_str()) {
            // prefix 以 `/` 结尾，剩余部分补回该 `/`
            let start = path.len() - rest.len() - 1;
            return Some(&path[start..]);
        }
        // `/type/repoKey` 无结尾斜杠
        let bare = &self.prefix[..self.prefix.len() - 1];
        (path == bare).then_some("/")
    }
}

/// 显式前缀路由表，按注册表顺序匹配，先注册者优先
#[derive(Debug, Clone, Default)]
pub struct PrefixRouter {
    routes: Vec<PrefixRoute>,
}

impl PrefixRouter {
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        let routes = registry
            .iter()
            .map(|mirror| PrefixRoute {
                prefix: mirror.prefix().to_string(),
                mirror: Arc::clone(mirror),
            })
            .collect();
        Self { routes }
    }

    /// 返回第一个命中的镜像与剩余路径
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(Arc<MirrorEntry>, String)> {
        self.routes.iter().find_map(|route| {
            route
                .strip(path)
                .map(|rest| (Arc::clone(&route.mirror), rest.to_string()))
        })
    }

    #[must_use]
    pub fn routes(&self) -> &[PrefixRoute] {
        &self.routes
    }
}

/// 请求路由器：显式前缀、启发式分类、回退候选
#[derive(Debug, Clone)]
pub struct RequestRouter {
    registry: Arc<Registry>,
    prefixes: PrefixRouter,
    classifier: Option<HeuristicClassifier>,
}

impl RequestRouter {
    /// `heuristics` 为 `false` 时所有无前缀路径都不可路由
    pub fn new(registry: Arc<Registry>, heuristics: bool) -> Result<Self> {
        let classifier = if heuristics {
            Some(HeuristicClassifier::new()?)
        } else {
            None
        };
        Ok(Self {
            prefixes: PrefixRouter::new(&registry),
            registry,
            classifier,
        })
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub const fn prefixes(&self) -> &PrefixRouter {
        &self.prefixes
    }

    /// 计算路由决策
    ///
    /// 路径穿越返回 `InvalidPath`；分类出的类型或镜像未配置返回 `UnknownMirror`。
    pub fn decide(&self, path: &str) -> Result<RoutingDecision> {
        if has_traversal(path) {
            return Err(ProxyError::invalid_path(path));
        }

        if let Some((mirror, rest)) = self.prefixes.match_path(path) {
            return Ok(RoutingDecision::Explicit { mirror, path: rest });
        }

        let Some(classification) = self.classifier.as_ref().and_then(|c| c.classify(path)) else {
            return Ok(RoutingDecision::Unresolved);
        };

        match classification {
            Classification::Maven => {
                let candidates = self.registry.mirrors_of(&RepositoryType::MAVEN);
                if candidates.is_empty() {
                    return Err(ProxyError::unknown_mirror(RepositoryType::MAVEN.as_str(), None));
                }
                Ok(RoutingDecision::HeuristicAmbiguous {
                    candidates,
                    path: path.to_string(),
                })
            }
            Classification::Repository {
                repo_type,
                repo_key,
            } => {
                let mirror = self
                    .registry
                    .get(&repo_type, repo_key)
                    .ok_or_else(|| ProxyError::unknown_mirror(repo_type.as_str(), Some(repo_key)))?;
                Ok(RoutingDecision::Heuristic {
                    mirror,
                    path: path.to_string(),
                })
            }
        }
    }

    /// 404 时返回给客户端的用法提示
    #[must_use]
    pub fn usage_hint(&self) -> String {
        let mut hint = String::from("No repository matched this path.\n\nUse an explicit prefix:\n");
        for route in self.prefixes.routes() {
            hint.push_str("  ");
            hint.push_str(route.prefix());
            hint.push_str("<path>\n");
        }
        hint
    }
}

/// 检测 `..` 路径段，包括百分号编码形式
///
/// 逐段解码后再按斜杠与反斜杠切分；解码失败的路径同样视为可疑。
#[must_use]
pub fn has_traversal(path: &str) -> bool {
    path.split('/').any(|segment| match urlencoding::decode(segment) {
        Ok(decoded) => decoded.split(['/', '\\']).any(|part| part == ".."),
        Err(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_mirrors;
    use crate::registry::RepositoryType;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn router(heuristics: bool) -> RequestRouter {
        let registry = Arc::new(Registry::from_mirrors(&builtin_mirrors()).unwrap());
        RequestRouter::new(registry, heuristics).unwrap()
    }

    #[test]
    fn test_explicit_prefix_strips_route() {
        let decision = router(true).decide("/maven/google/androidx/core/core/1.9.0/core-1.9.0.pom").unwrap();
        let RoutingDecision::Explicit { mirror, path } = decision else {
            panic!("expected explicit route");
        };
        assert_eq!(mirror.repo_key(), "google");
        assert_eq!(path, "/androidx/core/core/1.9.0/core-1.9.0.pom");
    }

    #[test]
    fn test_bare_prefix_maps_to_root() {
        let decision = router(true).decide("/npm/npmmirror").unwrap();
        let (mirror, path) = decision.single_target().unwrap();
        assert_eq!(mirror.repo_key(), "npmmirror");
        assert_eq!(path, "/");

        let decision = router(true).decide("/npm/npmmirror/").unwrap();
        assert_eq!(decision.single_target().unwrap().1, "/");
    }

    #[test]
    fn test_explicit_beats_heuristic() {
        // 路径本身像 Maven 构件，但显式前缀指向 apt
        let decision = router(true).decide("/apt/debian/lib/1.0/lib-1.0.jar").unwrap();
        assert!(matches!(decision, RoutingDecision::Explicit { .. }));
        assert_eq!(decision.single_target().unwrap().0.repo_type(), &RepositoryType::APT);
    }

    #[test]
    fn test_prefix_must_end_at_segment_boundary() {
        // `/maven/centralx/...` 不是 `/maven/central/` 的前缀
        let decision = router(false).decide("/maven/centralx/a.jar").unwrap();
        assert!(matches!(decision, RoutingDecision::Unresolved));
    }

    #[test]
    fn test_maven_path_falls_back_over_all_mirrors() {
        let decision = router(true).decide("/com/example/lib/1.0/lib-1.0.jar").unwrap();
        let RoutingDecision::HeuristicAmbiguous { candidates, path } = decision else {
            panic!("expected fallback route");
        };
        let keys: Vec<&str> = candidates.iter().map(|m| m.repo_key()).collect();
        assert_eq!(
            keys,
            vec![
                "central",
                "apache",
                "google",
                "jitpack",
                "gradle-plugins",
                "spring-plugins",
                "spring-milestones",
                "spring-snapshots"
            ]
        );
        assert_eq!(path, "/com/example/lib/1.0/lib-1.0.jar");
    }

    #[test]
    fn test_pypi_simple_url() {
        let decision = router(true).decide("/simple/requests/").unwrap();
        assert!(matches!(decision, RoutingDecision::Heuristic { .. }));
        assert_eq!(
            decision.upstream_urls(None),
            vec!["https://pypi.org/pypi/web/simple/simple/requests/"]
        );
    }

    #[test]
    fn test_heuristics_disabled() {
        let decision = router(false).decide("/simple/requests/").unwrap();
        assert!(matches!(decision, RoutingDecision::Unresolved));
    }

    #[test]
    fn test_classified_but_unconfigured_type() {
        let mirrors: Vec<_> = builtin_mirrors()
            .into_iter()
            .filter(|m| m.repo_type != "apt")
            .collect();
        let registry = Arc::new(Registry::from_mirrors(&mirrors).unwrap());
        let router = RequestRouter::new(registry, true).unwrap();

        let err = router.decide("/ubuntu/dists/jammy/Release").unwrap_err();
        assert!(matches!(err, ProxyError::UnknownMirror { .. }));
        assert_eq!(err.status_code(), 502);
    }

    #[rstest]
    #[case("/maven/central/../../etc/passwd")]
    #[case("/maven/central/%2e%2e/secret")]
    #[case("/com/%2E./x.jar")]
    #[case("/a/..%2fb")]
    #[case("/..")]
    fn test_traversal_is_rejected(#[case] path: &str) {
        let err = router(true).decide(path).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidPath { .. }));
    }

    #[test]
    fn test_dots_inside_segments_are_fine() {
        assert!(!has_traversal("/com/example/lib/1.0/lib..1.0.jar"));
        assert!(!has_traversal("/a/.../b"));
        assert!(!has_traversal("/com/example/lib%2Dcore/1.0/"));
    }

    #[rstest]
    #[case("/a/%2e%2e%5cb")]
    #[case("/a/..\\b")]
    #[case("/a/%ff%fe/b")]
    fn test_backslash_and_invalid_encoding_are_suspicious(#[case] path: &str) {
        assert!(has_traversal(path));
    }

    #[test]
    fn test_usage_hint_lists_prefixes() {
        let hint = router(true).usage_hint();
        assert!(hint.contains("/maven/central/<path>"));
        assert!(hint.contains("/apt/debian/<path>"));
    }
}
