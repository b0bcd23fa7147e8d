//! 检测模块：匹配评估、规则分析与分析编排
pub mod matcher;
pub mod analyzer;
pub mod detector;

// 导出核心接口
pub use self::matcher::{MatchEvaluator, MatchOutcome};
pub use self::analyzer::RuleAnalyzer;
pub use self::detector::WebAnalyzer;
