//! 规则仓库
//! 持有当前生效的规则快照，加载完成后整体原子替换
//! 并发读取方只会看到完整的新旧快照之一，不存在混合视图

use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::loader::{RuleLibrary, RuleLoader};
use crate::error::WaResult;

/// 规则仓库：显式持有、可整体替换的规则集合
pub struct RuleRepository {
    current: RwLock<Arc<RuleLibrary>>,
}

impl RuleRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleLibrary::default())),
        }
    }

    /// 获取当前快照（Arc克隆，零拷贝）
    pub fn snapshot(&self) -> Arc<RuleLibrary> {
        self.current.read().unwrap().clone()
    }

    /// 从目录重新加载并原子替换，返回加载的规则数
    /// 加载失败时保留原有快照
    pub fn load(&self, dir: &Path) -> WaResult<usize> {
        let library = RuleLoader::load_dir(dir)?;
        let count = library.len();
        *self.current.write().unwrap() = Arc::new(library);
        debug!("规则仓库已替换，共 {} 条规则", count);
        Ok(count)
    }

    /// 直接替换快照（注入预构建规则集，测试常用）
    pub fn replace(&self, library: RuleLibrary) {
        *self.current.write().unwrap() = Arc::new(library);
    }
}

impl Default for RuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::model::Rule;
    use std::collections::HashMap;

    fn library_with(names: &[&str]) -> RuleLibrary {
        let mut rules = HashMap::new();
        let mut origins = std::collections::HashSet::new();
        for name in names {
            let mut rule: Rule =
                serde_json::from_str(&format!(r#"{{"name": "{}", "matches": []}}"#, name))
                    .unwrap();
            rule.origin = "test".to_string();
            origins.insert("test".to_string());
            rules.insert(rule.key(), Arc::new(rule));
        }
        RuleLibrary { rules, origins }
    }

    #[test]
    fn test_snapshot_isolated_from_replace() {
        let repository = RuleRepository::new();
        repository.replace(library_with(&["A", "B"]));

        let old_snapshot = repository.snapshot();
        repository.replace(library_with(&["C"]));
        let new_snapshot = repository.snapshot();

        // 旧快照不受替换影响，新快照是完整的新集合
        assert_eq!(old_snapshot.len(), 2);
        assert!(old_snapshot.get("test", "A").is_some());
        assert_eq!(new_snapshot.len(), 1);
        assert!(new_snapshot.get("test", "C").is_some());
        assert!(new_snapshot.get("test", "A").is_none());
    }

    #[test]
    fn test_empty_repository_snapshot() {
        let repository = RuleRepository::new();
        assert!(repository.snapshot().is_empty());
    }
}
