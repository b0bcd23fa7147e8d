//! 规则加载器
//! 负责遍历规则目录、解析JSON规则并编译正则
//! 单个文件解析失败只跳过该文件，不影响其余规则加载

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};
use walkdir::WalkDir;

use super::model::Rule;
use crate::error::{WaResult, WebanalyzerError};

/// 加载完成的规则集合（一次加载的整体快照）
#[derive(Debug, Default)]
pub struct RuleLibrary {
    /// 规则键（origin_name）-> 规则
    pub rules: HashMap<String, Arc<Rule>>,
    /// 出现过的分类集合
    pub origins: HashSet<String>,
}

impl RuleLibrary {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 按分类+名称查找规则
    pub fn get(&self, origin: &str, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(&Rule::make_key(origin, name))
    }
}

/// 规则加载器
pub struct RuleLoader;

impl RuleLoader {
    /// 遍历目录加载全部*.json规则
    /// 分类 = 规则文件相对根目录的一级子目录名；直接位于根目录的规则归为"unknown"
    pub fn load_dir(dir: &Path) -> WaResult<RuleLibrary> {
        if !dir.is_dir() {
            return Err(WebanalyzerError::RuleLoadError(format!(
                "规则目录不存在：{}",
                dir.display()
            )));
        }

        let mut library = RuleLibrary::default();

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some("json")
            {
                continue;
            }

            let origin = Self::origin_of(dir, path);
            library.origins.insert(origin.clone());

            match Self::load_file(path, &origin) {
                Ok(rule) => {
                    debug!("已加载规则：{}（{}）", rule.key(), path.display());
                    library.rules.insert(rule.key(), Arc::new(rule));
                }
                Err(e) => {
                    error!("解析 {} 失败，错误：{}", path.display(), e);
                }
            }
        }

        Ok(library)
    }

    /// 解析并编译单个规则文件
    pub fn load_file(path: &Path, origin: &str) -> WaResult<Rule> {
        let content = std::fs::read_to_string(path)?;
        let mut rule: Rule = serde_json::from_str(&content)?;
        rule.origin = origin.to_string();
        rule.compile()?;
        Ok(rule)
    }

    /// 计算规则文件的分类：相对根目录的第一个路径段
    fn origin_of(root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .ok()
            .and_then(|relative| {
                let mut components = relative.components();
                let first = components.next()?;
                // 只有一段说明文件直接位于根目录
                components.next()?;
                Some(first.as_os_str().to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}
