//! # 内置镜像表
//!
//! 未配置 `[[mirrors]]` 时使用的默认仓库镜像，顺序即回退顺序。

use super::MirrorConfig;

const BUILTIN_MIRRORS: &[(&str, &str, &str)] = &[
    ("maven", "central", "https://repo1.maven.org/maven2"),
    ("maven", "apache", "https://repository.apache.org/content/repositories/releases"),
    ("maven", "google", "https://maven.google.com"),
    ("maven", "jitpack", "https://jitpack.io"),
    ("maven", "gradle-plugins", "https://plugins.gradle.org/m2"),
    ("maven", "spring-plugins", "https://repo.spring.io/plugins-release"),
    ("maven", "spring-milestones", "https://repo.spring.io/milestone"),
    ("maven", "spring-snapshots", "https://repo.spring.io/snapshot"),
    ("pypi", "official", "https://pypi.org/pypi/web/simple"),
    ("pypi", "tuna", "https://pypi.tuna.tsinghua.edu.cn/simple"),
    ("npm", "official", "https://registry.npmjs.org"),
    ("npm", "npmmirror", "https://registry.npmmirror.com"),
    ("go", "official", "https://proxy.golang.org"),
    ("go", "goproxy-cn", "https://goproxy.cn"),
    ("apt", "ubuntu", "http://archive.ubuntu.com/ubuntu"),
    ("apt", "debian", "http://deb.debian.org/debian"),
];

/// 内置镜像列表
#[must_use]
pub fn builtin_mirrors() -> Vec<MirrorConfig> {
    BUILTIN_MIRRORS
        .iter()
        .map(|(repo_type, key, url)| MirrorConfig {
            repo_type: (*repo_type).to_string(),
            key: (*key).to_string(),
            url: (*url).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maven_order() {
        let keys: Vec<String> = builtin_mirrors()
            .into_iter()
            .filter(|m| m.repo_type == "maven")
            .map(|m| m.key)
            .collect();
        assert_eq!(
            keys,
            [
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
    }

    #[test]
    fn test_every_builtin_url_has_no_trailing_slash() {
        assert!(builtin_mirrors().iter().all(|m| !m.url.ends_with('/')));
    }
}
