//! 版本提取工具模块
//! 负责从正则捕获结果中提取技术版本号
//! 优先级：命名分组version > offset指定分组 > 全部非空分组拼接

use regex::Captures;

/// 版本提取工具类
/// 提供静态方法 `extract` 用于版本号提取
pub struct VersionExtractor;

impl VersionExtractor {
    /// 从正则捕获结果中提取有效版本号
    ///
    /// # 参数
    /// - `captures`: 正则捕获结果
    /// - `offset`: 规则配置的分组偏移（0表示第一个捕获分组）
    ///
    /// # 返回值
    /// - `Some(String)`: 提取到的版本号
    /// - `None`: 无可用版本信息（调用方保留已有版本提示）
    pub fn extract(captures: &Captures, offset: Option<usize>) -> Option<String> {
        // 1. 命名分组version优先
        if let Some(matched) = captures.name("version") {
            let version = matched.as_str().trim();
            if !version.is_empty() {
                return Some(version.to_string());
            }
        }

        // 2. offset指定分组（捕获分组从1开始，offset 0对应分组1）
        if let Some(offset) = offset {
            if captures.len() > offset + 1 {
                if let Some(matched) = captures.get(offset + 1) {
                    let version = matched.as_str().trim();
                    if !version.is_empty() {
                        return Some(version.to_string());
                    }
                }
            }
        }

        // 3. 回退：拼接全部非空捕获分组
        let joined: String = (1..captures.len())
            .filter_map(|index| captures.get(index))
            .map(|matched| matched.as_str())
            .filter(|group| !group.is_empty())
            .collect();

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}
