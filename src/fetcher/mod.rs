//! 抓取模块：HTTP传输能力抽象与reqwest实现
//! 核心只依赖Fetcher trait，便于测试时注入桩实现

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::config::GlobalConfig;
use crate::error::{WaResult, WebanalyzerError};

/// 一次抓取的原始结果
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 响应状态码
    pub status: u16,
    /// 有序响应头（同名头可重复出现）
    pub headers: Vec<(String, String)>,
    /// 原始响应体字节
    pub body: Vec<u8>,
    /// 重定向后的最终URL
    pub final_url: String,
}

/// 抓取能力抽象
/// 任何错误统一视为"目标不可达"
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> WaResult<FetchedPage>;
}

/// 基于reqwest的默认抓取实现
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// 根据全局配置构建客户端
    /// 证书校验关闭：指纹识别面向任意站点，自签证书不应阻断检测
    pub fn new(config: &GlobalConfig) -> WaResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                WebanalyzerError::InvalidInput(format!("无效Header名称：{}，错误：{}", key, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                WebanalyzerError::InvalidInput(format!("无效Header值：{}，错误：{}", value, e))
            })?;
            default_headers.insert(name, value);
        }

        let redirect_policy = if config.allow_redirect {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout))
            .redirect(redirect_policy)
            .danger_accept_invalid_certs(true)
            .default_headers(default_headers);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}


#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> WaResult<FetchedPage> {
        debug!("发送请求：{}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        // 保留响应头顺序与重复项
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();

        let body = response.bytes().await?.to_vec();

        Ok(FetchedPage {
            status,
            headers,
            body,
            final_url,
        })
    }
}
