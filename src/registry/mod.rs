//! # 仓库注册表
//!
//! 静态的 `{type -> {repoKey -> MirrorEntry}}` 映射，启动时构建后只读共享。
//! 迭代顺序即配置顺序，决定显式前缀匹配顺序与 Maven 回退顺序。

mod mirror;

pub use mirror::{MirrorEntry, RepositoryType};

use indexmap::IndexMap;
use std::sync::Arc;

use crate::config::MirrorConfig;
use crate::error::ConfigResult;
use crate::error::config::ConfigError;

/// 仓库注册表
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: IndexMap<RepositoryType, IndexMap<String, Arc<MirrorEntry>>>,
}

impl Registry {
    /// 从镜像配置构建
    pub fn from_mirrors(mirrors: &[MirrorConfig]) -> ConfigResult<Self> {
        let mut registry = Self::default();
        for mirror in mirrors {
            registry.insert(MirrorEntry::new(
                RepositoryType::new(mirror.repo_type.as_str()),
                mirror.key.as_str(),
                &mirror.url,
            )?)?;
        }
        Ok(registry)
    }

    /// 追加镜像，同类型下键重复时报错
    pub fn insert(&mut self, entry: MirrorEntry) -> ConfigResult<()> {
        let repos = self.types.entry(entry.repo_type().clone()).or_default();
        if repos.contains_key(entry.repo_key()) {
            return Err(ConfigError::DuplicateMirror {
                repo_type: entry.repo_type().to_string(),
                repo_key: entry.repo_key().to_string(),
            });
        }
        repos.insert(entry.repo_key().to_string(), Arc::new(entry));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, repo_type: &RepositoryType, repo_key: &str) -> Option<Arc<MirrorEntry>> {
        self.types.get(repo_type)?.get(repo_key).cloned()
    }

    /// 某类型下的全部镜像，按配置顺序
    #[must_use]
    pub fn mirrors_of(&self, repo_type: &RepositoryType) -> Vec<Arc<MirrorEntry>> {
        self.types
            .get(repo_type)
            .map(|repos| repos.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 按类型顺序、再按镜像键顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MirrorEntry>> {
        self.types.values().flat_map(IndexMap::values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.values().map(IndexMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
