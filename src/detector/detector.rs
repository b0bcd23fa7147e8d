//! 检测器核心：编排一次完整的技术指纹分析
//! 核心职责：
//! 1. 主目标与favicon预抓取（填充目标缓存）
//! 2. 信号量限流的并发规则评估
//! 3. implies/excludes关联推导与结果汇总
//! 4. 单规则测试入口与规则列表/更新

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::analyzer::RuleAnalyzer;
use crate::config::GlobalConfig;
use crate::error::WaResult;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::rule::model::{Detection, Rule};
use crate::rule::{RuleLoader, RuleRepository, RuleUpdater};
use crate::target::TargetCache;

/// implies推导产生的合成结果使用的分类名
const IMPLIED_ORIGIN: &str = "implied";
/// 单规则测试入口强制使用的分类名
const TEST_ORIGIN: &str = "test";

/// Web技术指纹分析器
pub struct WebAnalyzer {
    config: GlobalConfig,
    repository: Arc<RuleRepository>,
    cache: Arc<TargetCache>,
}

impl WebAnalyzer {
    /// 使用默认HTTP传输创建分析器
    pub fn new(config: GlobalConfig) -> WaResult<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// 注入自定义抓取实现（测试注入桩传输）
    pub fn with_fetcher(config: GlobalConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            repository: Arc::new(RuleRepository::new()),
            cache: Arc::new(TargetCache::new(fetcher)),
        }
    }

    /// 规则仓库句柄（注入预构建规则集时使用）
    pub fn repository(&self) -> &Arc<RuleRepository> {
        &self.repository
    }

    /// 从配置的规则目录重新加载规则，返回规则数
    pub fn reload_rules(&self) -> WaResult<usize> {
        self.repository.load(&self.config.rule_dir)
    }

    /// 当前已加载的规则列表（按键排序，便于稳定输出）
    pub fn list_rules(&self) -> Vec<Arc<Rule>> {
        let snapshot = self.repository.snapshot();
        let mut rules: Vec<Arc<Rule>> = snapshot.rules.values().cloned().collect();
        rules.sort_by_key(|rule| rule.key());
        rules
    }

    /// 从远程仓库更新本地规则目录
    pub async fn update_rules(&self) -> WaResult<usize> {
        RuleUpdater::update(&self.config).await
    }

    /// 单规则测试入口：仅运行指定规则文件，分类强制为test
    pub async fn test_rule(&self, url: &str, rule_path: &Path) -> WaResult<Option<Detection>> {
        let rule = RuleLoader::load_file(rule_path, TEST_ORIGIN)?;
        if rule.matches.is_empty() {
            info!("规则 {} 无匹配项，跳过", rule.name);
            return Ok(None);
        }

        self.cache.reset();
        if self.cache.get_or_fetch(url).await.is_err() {
            info!("请求 {} 失败", url);
            return Ok(None);
        }

        Ok(RuleAnalyzer::check_rule(&rule, url, &self.cache, self.config.aggression).await)
    }

    /// 对目标URL运行全部已加载规则，返回命中的技术列表
    /// 主目标不可达时返回空列表（整次运行无结果，不作为错误上抛）
    pub async fn analyze(&self, url: &str) -> WaResult<Vec<Detection>> {
        debug!("开始分析 {}", url);
        self.cache.reset();

        // 1. 主目标抓取失败即硬停
        if self.cache.get_or_fetch(url).await.is_err() {
            info!("请求 {} 失败", url);
            return Ok(Vec::new());
        }

        // 2. 预抓favicon为探测它的规则填充缓存，失败不影响运行
        if let Ok(favicon_url) = Url::parse(url).and_then(|base| base.join("/favicon.ico")) {
            let _ = self.cache.get_or_fetch(favicon_url.as_str()).await;
        }

        let snapshot = self.repository.snapshot();

        // 3. 信号量限流的并发规则评估
        //    每个任务返回(规则, 判定)，规则身份与任务结果显式绑定
        let semaphore = Arc::new(Semaphore::new(self.config.max_tasks));
        let mut tasks: JoinSet<(Arc<Rule>, Option<Detection>)> = JoinSet::new();

        for rule in snapshot.rules.values() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("信号量不会被关闭");
            let rule = rule.clone();
            let cache = self.cache.clone();
            let base_url = url.to_string();
            let aggression = self.config.aggression;

            tasks.spawn(async move {
                let _permit = permit;
                let verdict =
                    RuleAnalyzer::check_rule(&rule, &base_url, &cache, aggression).await;
                (rule, verdict)
            });
        }

        // 4. 收集判定并累积implies/excludes
        let mut matched: Vec<(Arc<Rule>, Detection)> = Vec::new();
        let mut implies: HashSet<String> = HashSet::new();
        let mut excludes: HashSet<String> = HashSet::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((rule, Some(detection))) => {
                    implies.extend(rule.implies.iter().cloned());
                    excludes.extend(rule.excludes.iter().cloned());
                    matched.push((rule, detection));
                }
                Ok((_, None)) => {}
                Err(e) => {
                    warn!("规则评估任务失败：{}", e);
                }
            }
        }

        // 5. 全部任务结束后统一应用excludes，结果与任务完成顺序无关
        let mut results: Vec<Detection> = matched
            .into_iter()
            .filter(|(_, detection)| !excludes.contains(&detection.name))
            .map(|(_, detection)| detection)
            .collect();

        // 6. implies推导：跨全部分类查找被推导规则，合并其excludes
        for implied in &implies {
            for origin in &snapshot.origins {
                if let Some(rule) = snapshot.get(origin, implied) {
                    excludes.extend(rule.excludes.iter().cloned());
                }
            }

            if excludes.contains(implied) {
                continue;
            }
            results.push(Detection {
                name: implied.clone(),
                origin: IMPLIED_ORIGIN.to_string(),
                version: None,
                detail: None,
            });
        }

        debug!("分析完成，共发送 {} 个请求", self.cache.request_count());
        Ok(results)
    }
}
