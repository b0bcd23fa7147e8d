//! webanalyzer - Web技术栈指纹识别引擎
//! 给定URL抓取页面（按需抓取辅助资源），对响应数据评估签名规则，
//! 汇总命中的技术与可选的版本信息

// 导出全局错误类型
pub use self::error::{WebanalyzerError, WaResult};

// 导出配置模块
pub use self::config::{Aggression, GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出规则模块核心接口
pub use self::rule::{
    Detection, MatchSpec, Rule, SearchScope,
    RuleLibrary, RuleLoader, RuleRepository, RuleUpdater,
};

// 导出提取模块核心接口
pub use self::extractor::HtmlExtractor;

// 导出抓取模块核心接口
pub use self::fetcher::{FetchedPage, Fetcher, HttpFetcher};

// 导出目标模块核心接口
pub use self::target::{Target, TargetCache};

// 导出工具模块核心接口
pub use self::utils::{HeaderConverter, VersionExtractor};

// 导出检测模块核心接口
pub use self::detector::{MatchEvaluator, MatchOutcome, RuleAnalyzer, WebAnalyzer};

// 声明所有子模块
pub mod config;
pub mod condition;
pub mod error;
pub mod rule;
pub mod extractor;
pub mod fetcher;
pub mod target;
pub mod utils;
pub mod detector;
