//! 规则模块：数据模型、目录加载、仓库快照与远程更新
pub mod model;
pub mod loader;
pub mod repository;
pub mod updater;

// 导出核心接口
pub use self::model::{Detection, MatchSpec, Rule, SearchScope};
pub use self::loader::{RuleLibrary, RuleLoader};
pub use self::repository::RuleRepository;
pub use self::updater::RuleUpdater;
