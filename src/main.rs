//! webanalyzer 命令行入口

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webanalyzer::{Aggression, ConfigManager, WebAnalyzer};

#[derive(Parser, Debug)]
#[command(name = "webanalyzer", version, about = "Web技术栈指纹识别")]
struct Cli {
    /// 目标URL
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// 规则目录，默认 ./rules
    #[arg(short = 'd', long, default_value = "rules")]
    directory: PathBuf,

    /// 侵入级别（0被动 / 1仅custom规则 / 2全部规则）
    #[arg(short = 'a', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    aggression: u8,

    /// 自定义User-Agent
    #[arg(short = 'U', long)]
    user_agent: Option<String>,

    /// 自定义请求头（"Key: Value"，可重复）
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// 日志详细级别（0-5）
    #[arg(short = 'v', long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=5))]
    verbose: u8,

    /// 仅测试指定的单个规则文件
    #[arg(short = 'r', long)]
    rule: Option<PathBuf>,

    /// 代理URL（http/https/socks5）
    #[arg(long)]
    proxy: Option<String>,

    /// 禁止跟随重定向
    #[arg(long)]
    disallow_redirect: bool,

    /// 列出已加载的规则
    #[arg(long)]
    list_rules: bool,

    /// 从远程仓库更新规则
    #[arg(long)]
    update: bool,
}

/// verbose级别映射到日志过滤器
fn log_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    EnvFilter::new(format!("webanalyzer={}", level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .init();

    // 组装配置
    let mut builder = ConfigManager::custom()
        .rule_dir(cli.directory.clone())
        .aggression(Aggression::from(cli.aggression))
        .allow_redirect(!cli.disallow_redirect);
    if let Some(user_agent) = cli.user_agent {
        builder = builder.header("User-Agent".to_string(), user_agent);
    }
    for line in &cli.headers {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        builder = builder.header(key.trim().to_string(), value.trim().to_string());
    }
    if let Some(proxy) = cli.proxy {
        builder = builder.proxy(proxy);
    }
    let config = builder.build();

    let analyzer = WebAnalyzer::new(config)?;

    if cli.update {
        let count = analyzer.update_rules().await?;
        println!("update rules done, {} files", count);
        return Ok(());
    }

    if cli.list_rules {
        if !cli.directory.is_dir() {
            println!("rules directory is not exist, use -d to specify rule directory");
            return Ok(());
        }
        let count = analyzer.reload_rules()?;
        for rule in analyzer.list_rules() {
            match &rule.desc {
                Some(desc) => println!("{} - {} - {}", rule.name, rule.origin, desc),
                None => println!("{} - {}", rule.name, rule.origin),
            }
        }
        println!("\n{} rules totally", count);
        return Ok(());
    }

    let Some(url) = cli.url else {
        println!("invalid url, use -u to specify target");
        return Ok(());
    };

    // 单规则测试入口
    if let Some(rule_path) = cli.rule {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("User abort...");
            }
            result = analyzer.test_rule(&url, &rule_path) => {
                if let Some(detection) = result? {
                    println!("{}", serde_json::to_string_pretty(&detection)?);
                }
            }
        }
        return Ok(());
    }

    if !cli.directory.is_dir() {
        println!("rules directory is not exist, use -d to specify rule directory");
        return Ok(());
    }
    analyzer.reload_rules()?;

    // 中断时丢弃部分结果，不输出任何内容
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("User abort...");
        }
        results = analyzer.analyze(&url) => {
            let results = results?;
            if !results.is_empty() {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }
    }

    Ok(())
}
