//! 目标模块：单个URL的响应快照与进程内目标缓存
//! Target一经创建不可变，缓存以Arc共享给并发的规则评估任务

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use md5::{Digest, Md5};
use tracing::{debug, error};

use crate::error::WaResult;
use crate::extractor::HtmlExtractor;
use crate::fetcher::{FetchedPage, Fetcher};
use crate::utils::HeaderConverter;

/// 单个URL抓取+解析后的完整快照
#[derive(Debug, Clone)]
pub struct Target {
    /// 请求URL（缓存键）
    pub url: String,
    /// 响应体文本
    pub body: String,
    /// 有序响应头
    pub headers: Vec<(String, String)>,
    /// 响应状态码
    pub status: u16,
    /// 外链script的src列表
    pub script: Vec<String>,
    /// meta标签 name -> content
    pub meta: HashMap<String, String>,
    /// 页面title（无则为空字符串）
    pub title: String,
    /// cookie名 -> 值
    pub cookies: HashMap<String, String>,
    /// Set-Cookie原始文本
    pub raw_cookies: String,
    /// 原始响应（头文本 + 响应体）
    pub raw_response: String,
    /// 序列化后的响应头文本
    pub raw_headers: String,
    /// 响应体字节的md5十六进制摘要
    pub md5: String,
}

impl Target {
    /// 由抓取结果构建快照（解析HTML、计算摘要，一次完成）
    pub fn from_page(url: &str, page: &FetchedPage) -> Self {
        let body = String::from_utf8_lossy(&page.body).to_string();

        let extractor = HtmlExtractor::new();
        let extracted = extractor.extract(&body);

        // meta重名时后出现的覆盖先出现的
        let mut meta = HashMap::new();
        for (name, content) in extracted.get_meta_tags() {
            meta.insert(name, content);
        }

        let raw_headers = HeaderConverter::to_raw(&page.headers);
        let raw_response = format!("{}{}", raw_headers, body);
        let md5 = format!("{:x}", Md5::digest(&page.body));

        Self {
            url: url.to_string(),
            body,
            headers: page.headers.clone(),
            status: page.status,
            script: extracted.get_script_srcs(),
            meta,
            title: extracted.get_title(),
            cookies: HeaderConverter::cookie_map(&page.headers),
            raw_cookies: HeaderConverter::raw_cookies(&page.headers),
            raw_response,
            raw_headers,
            md5,
        }
    }

    /// 查询指定响应头（大小写不敏感）
    pub fn header(&self, key: &str) -> Option<&str> {
        HeaderConverter::get(&self.headers, key)
    }
}

/// 目标缓存：每个URL至多一个Target，单次分析运行期间有效
/// 并发读安全；同一未缓存URL的并发写可能重复抓取，结果幂等、后写覆盖无害
pub struct TargetCache {
    targets: RwLock<HashMap<String, Arc<Target>>>,
    req_sent: AtomicUsize,
    fetcher: Arc<dyn Fetcher>,
}

impl TargetCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            targets: RwLock::new(HashMap::new()),
            req_sent: AtomicUsize::new(0),
            fetcher,
        }
    }

    /// 读取已缓存的Target（无网络IO）
    pub fn get(&self, url: &str) -> Option<Arc<Target>> {
        self.targets.read().unwrap().get(url).cloned()
    }

    /// 获取Target，未缓存则抓取+解析后写入
    /// 抓取失败不缓存任何内容，下次访问重新尝试
    pub async fn get_or_fetch(&self, url: &str) -> WaResult<Arc<Target>> {
        if let Some(target) = self.get(url) {
            return Ok(target);
        }

        self.req_sent.fetch_add(1, Ordering::Relaxed);
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                error!("请求失败：{}", e);
                return Err(e);
            }
        };

        let target = Arc::new(Target::from_page(url, &page));
        self.targets
            .write()
            .unwrap()
            .insert(url.to_string(), target.clone());
        debug!("已缓存目标：{}（状态码 {}）", url, target.status);

        Ok(target)
    }

    /// 清空缓存并重置请求计数（每次分析运行开始时调用）
    pub fn reset(&self) {
        self.targets.write().unwrap().clear();
        self.req_sent.store(0, Ordering::Relaxed);
    }

    /// 本次运行已发送的请求数（仅用于诊断日志）
    pub fn request_count(&self) -> usize {
        self.req_sent.load(Ordering::Relaxed)
    }

    /// 当前已缓存的URL集合（诊断/测试用）
    pub fn cached_urls(&self) -> Vec<String> {
        self.targets.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::stub::StubFetcher;

    fn sample_page() -> FetchedPage {
        FetchedPage {
            status: 200,
            headers: vec![
                ("Server".to_string(), "nginx/1.21.6".to_string()),
                (
                    "Set-Cookie".to_string(),
                    "PHPSESSID=abc123; path=/".to_string(),
                ),
            ],
            body: br#"<html><head><title>Demo</title>
                <meta name="generator" content="WordPress 6.0">
                <script src="/static/jquery.min.js"></script>
                </head><body>jQuery v3.6.0</body></html>"#
                .to_vec(),
            final_url: "http://example.com/".to_string(),
        }
    }

    #[test]
    fn test_target_from_page() {
        let page = sample_page();
        let target = Target::from_page("http://example.com/", &page);

        assert_eq!(target.status, 200);
        assert_eq!(target.title, "Demo");
        assert_eq!(target.script, vec!["/static/jquery.min.js".to_string()]);
        assert_eq!(
            target.meta.get("generator"),
            Some(&"WordPress 6.0".to_string())
        );
        assert_eq!(
            target.cookies.get("PHPSESSID"),
            Some(&"abc123".to_string())
        );
        assert!(target.raw_headers.contains("Server: nginx/1.21.6"));
        assert!(target.raw_response.starts_with(&target.raw_headers));
        assert!(target.raw_response.ends_with(&target.body));
        assert_eq!(target.md5.len(), 32);
        assert_eq!(target.header("server"), Some("nginx/1.21.6"));
    }

    #[tokio::test]
    async fn test_cache_fetches_once() {
        let mut pages = HashMap::new();
        pages.insert("http://example.com/".to_string(), sample_page());
        let fetcher = Arc::new(StubFetcher::new(pages));
        let cache = TargetCache::new(fetcher.clone());

        let first = cache.get_or_fetch("http://example.com/").await.unwrap();
        let second = cache.get_or_fetch("http://example.com/").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.requests.lock().unwrap().len(), 1);
        assert_eq!(cache.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_failure_not_cached() {
        let fetcher = Arc::new(StubFetcher::new(HashMap::new()));
        let cache = TargetCache::new(fetcher.clone());

        assert!(cache.get_or_fetch("http://missing.example/").await.is_err());
        assert!(cache.cached_urls().is_empty());
        // 失败未缓存，再次访问会重新请求
        assert!(cache.get_or_fetch("http://missing.example/").await.is_err());
        assert_eq!(fetcher.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_reset() {
        let mut pages = HashMap::new();
        pages.insert("http://example.com/".to_string(), sample_page());
        let cache = TargetCache::new(Arc::new(StubFetcher::new(pages)));

        cache.get_or_fetch("http://example.com/").await.unwrap();
        assert_eq!(cache.cached_urls().len(), 1);

        cache.reset();
        assert!(cache.cached_urls().is_empty());
        assert_eq!(cache.request_count(), 0);
    }
}
