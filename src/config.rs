//! 全局配置管理,存储所有可配置项

use std::collections::HashMap;
use std::path::PathBuf;

/// 默认User-Agent（与常见桌面浏览器保持一致，降低被拦截概率）
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/11.1.2 Safari/605.1.15";

/// 侵入级别：控制带url字段的match是否触发额外网络请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggression {
    /// 被动模式：仅使用已缓存的目标数据
    #[default]
    Passive,
    /// 仅custom类规则允许额外请求
    CustomOnly,
    /// 所有规则均允许额外请求
    Always,
}

impl From<u8> for Aggression {
    fn from(level: u8) -> Self {
        match level {
            0 => Aggression::Passive,
            1 => Aggression::CustomOnly,
            _ => Aggression::Always,
        }
    }
}

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 规则目录路径
    pub rule_dir: PathBuf,
    // 侵入级别
    pub aggression: Aggression,
    // 超时配置（单位：秒）
    pub http_timeout: u64,
    // 是否跟随重定向
    pub allow_redirect: bool,
    // 代理URL（http/https/socks5）
    pub proxy: Option<String>,
    // 请求头（默认仅User-Agent）
    pub headers: HashMap<String, String>,
    // 规则评估并发上限
    pub max_tasks: usize,
    // 远程规则仓库（owner/repo）
    pub rule_repository: String,
    // GitHub代理URL（更新规则时的回退源）
    pub gh_proxy_url: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());

        Self {
            rule_dir: PathBuf::from("rules"),
            aggression: Aggression::Passive,
            http_timeout: 30,
            allow_redirect: true,
            proxy: None,
            headers,
            max_tasks: 20,
            rule_repository: "webanalyzer/rules".to_string(),
            gh_proxy_url: "https://ghfast.top/".to_string(),
        }
    }
}

/// 配置管理器（单例）
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn rule_dir(mut self, dir: PathBuf) -> Self {
        self.config.rule_dir = dir;
        self
    }

    pub fn aggression(mut self, aggression: Aggression) -> Self {
        self.config.aggression = aggression;
        self
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn allow_redirect(mut self, allow: bool) -> Self {
        self.config.allow_redirect = allow;
        self
    }

    pub fn proxy(mut self, proxy: String) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// 追加/覆盖单个请求头
    pub fn header(mut self, key: String, value: String) -> Self {
        self.config.headers.insert(key, value);
        self
    }

    pub fn max_tasks(mut self, max_tasks: usize) -> Self {
        self.config.max_tasks = max_tasks;
        self
    }

    pub fn rule_repository(mut self, repository: String) -> Self {
        self.config.rule_repository = repository;
        self
    }

    pub fn gh_proxy_url(mut self, url: String) -> Self {
        self.config.gh_proxy_url = url;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}

impl Default for CustomConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
