//! 规则更新器
//! 从GitHub规则仓库拉取*.json规则文件写入本地规则目录
//! 原始URL失败时回退到配置的GitHub代理

use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GlobalConfig;
use crate::error::{WaResult, WebanalyzerError};

/// GitHub tree接口响应
#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// 规则更新器
pub struct RuleUpdater;

impl RuleUpdater {
    /// 拉取远程规则仓库的全部*.json文件，返回写入的文件数
    pub async fn update(config: &GlobalConfig) -> WaResult<usize> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout))
            .build()?;

        // 1. 列出仓库文件树
        let tree_url = format!(
            "https://api.github.com/repos/{}/git/trees/HEAD?recursive=1",
            config.rule_repository
        );
        let response = client
            .get(&tree_url)
            .header("User-Agent", "webanalyzer/0.1.0")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebanalyzerError::RuleUpdateError(format!(
                "列出规则仓库失败，URL {} 返回状态码 {}",
                tree_url,
                response.status()
            )));
        }
        let tree: TreeResponse = response.json().await?;

        // 2. 逐个拉取json规则文件并落盘
        let mut count = 0usize;
        for entry in &tree.tree {
            if entry.kind != "blob" || !entry.path.ends_with(".json") {
                continue;
            }

            let raw_url = format!(
                "https://raw.githubusercontent.com/{}/HEAD/{}",
                config.rule_repository, entry.path
            );
            let content = Self::fetch_with_fallback(&client, &raw_url, &config.gh_proxy_url)
                .await?;

            Self::write_rule_file(&config.rule_dir, &entry.path, &content).await?;
            count += 1;
        }

        debug!("规则更新完成，共写入 {} 个文件", count);
        Ok(count)
    }

    /// 先走原始URL，失败回退GitHub代理
    async fn fetch_with_fallback(
        client: &Client,
        raw_url: &str,
        gh_proxy_url: &str,
    ) -> WaResult<String> {
        match Self::fetch_text(client, raw_url).await {
            Ok(content) => Ok(content),
            Err(e) => {
                let proxy_path = raw_url.trim_start_matches("https://");
                let fallback_url = format!("{}{}", gh_proxy_url, proxy_path);
                warn!(
                    "拉取 {} 失败：{}，尝试代理URL：{}",
                    raw_url, e, fallback_url
                );
                Self::fetch_text(client, &fallback_url).await
            }
        }
    }

    async fn fetch_text(client: &Client, url: &str) -> WaResult<String> {
        let response = client
            .get(url)
            .header("User-Agent", "webanalyzer/0.1.0")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebanalyzerError::RuleUpdateError(format!(
                "URL {} 返回状态码 {}",
                url,
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    /// 按仓库内相对路径写入规则目录（保留子目录结构即分类）
    async fn write_rule_file(rule_dir: &Path, relative: &str, content: &str) -> WaResult<()> {
        let path = rule_dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
