//! 匹配评估器
//! 单个MatchSpec的评估：目标解析、搜索范围解析、检测键判定与版本提取
//! 评估顺序 status -> md5 -> text -> regexp，任一失败即短路为不命中

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::rule::model::{MatchSpec, SearchScope};
use crate::target::{Target, TargetCache};
use crate::utils::VersionExtractor;

/// 单个匹配项的评估结果
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    pub version: Option<String>,
    pub detail: Option<String>,
}

impl MatchOutcome {
    fn no_match() -> Self {
        Self::default()
    }
}

/// 搜索上下文：单个文本或文本列表（如script的src列表）
enum SearchContext<'a> {
    One(&'a str),
    Many(&'a [String]),
}

impl<'a> SearchContext<'a> {
    /// 统一为元素序列，单个文本视为一元列表
    fn items(&self) -> Vec<&'a str> {
        match *self {
            SearchContext::One(text) => vec![text],
            SearchContext::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

/// 匹配评估器
pub struct MatchEvaluator;

impl MatchEvaluator {
    /// 评估单个匹配项
    /// - `base_url`: 本次分析的主目标URL（其Target必须已缓存）
    /// - `aggressive`: 是否允许为带url字段的匹配项发起额外请求
    pub async fn check(
        spec: &MatchSpec,
        base_url: &str,
        cache: &TargetCache,
        aggressive: bool,
    ) -> MatchOutcome {
        // 未声明任何检测键的匹配项无效，恒为不命中
        if !spec.has_primary_kind() {
            return MatchOutcome::no_match();
        }

        let Some(target) = Self::resolve_target(spec, base_url, cache, aggressive).await
        else {
            return MatchOutcome::no_match();
        };

        // 搜索范围解析；按键查找的范围缺键即不命中
        let Some(context) = Self::resolve_scope(&spec.scope, &target) else {
            return MatchOutcome::no_match();
        };

        let mut version = spec.version.clone();
        let mut detail = None;

        // status：状态码精确相等
        if let Some(expected) = spec.status {
            if expected != target.status {
                return MatchOutcome::no_match();
            }
            detail = Some(format!(
                "response status of {} match {}",
                target.url, expected
            ));
        }

        // md5：响应体摘要精确相等
        if let Some(expected) = &spec.md5 {
            if expected != &target.md5 {
                return MatchOutcome::no_match();
            }
            detail = Some(format!("md5 of body of {} match {}", target.url, expected));
        }

        // text：字面包含，列表上下文任一元素命中即可
        if let Some(literal) = &spec.text {
            let hit = context.items().iter().any(|item| item.contains(literal));
            if !hit {
                return MatchOutcome::no_match();
            }
            detail = Some(format!(
                "text \"{}\" in {} of {}",
                literal,
                spec.scope.describe(),
                target.url
            ));
        }

        // regexp：逐元素搜索，首个命中的元素决定版本与detail
        if let Some(pattern) = &spec.pattern {
            let mut hit = false;
            for item in context.items() {
                if let Some(captures) = pattern.captures(item) {
                    if let Some(extracted) = VersionExtractor::extract(&captures, spec.offset) {
                        version = Some(extracted);
                    }
                    detail = Some(format!(
                        "regex \"{}\" match {} of {}",
                        pattern.as_str(),
                        spec.scope.describe(),
                        target.url
                    ));
                    hit = true;
                    break;
                }
            }
            if !hit {
                return MatchOutcome::no_match();
            }
        }

        MatchOutcome {
            matched: true,
            version,
            detail,
        }
    }

    /// 解析匹配项作用的目标
    /// - 无url字段：主目标（必须已缓存）
    /// - url为"/"：等同主目标，不发起独立请求
    /// - 其他：相对主URL解析；缓存未命中时仅在侵入模式下抓取
    async fn resolve_target(
        spec: &MatchSpec,
        base_url: &str,
        cache: &TargetCache,
        aggressive: bool,
    ) -> Option<Arc<Target>> {
        let Some(relative) = &spec.url else {
            return cache.get(base_url);
        };
        if relative == "/" {
            return cache.get(base_url);
        }

        let full_url = Url::parse(base_url)
            .and_then(|base| base.join(relative))
            .ok()?
            .to_string();

        if let Some(target) = cache.get(&full_url) {
            return Some(target);
        }

        if aggressive {
            cache.get_or_fetch(&full_url).await.ok()
        } else {
            debug!(
                "匹配项带url字段（{}）但未开启侵入模式，视为不命中",
                relative
            );
            None
        }
    }

    /// 解析搜索范围为具体上下文；按键查找缺键返回None
    fn resolve_scope<'a>(scope: &SearchScope, target: &'a Target) -> Option<SearchContext<'a>> {
        Some(match scope {
            SearchScope::Body => SearchContext::One(&target.body),
            SearchScope::All => SearchContext::One(&target.raw_response),
            SearchScope::Headers => SearchContext::One(&target.raw_headers),
            SearchScope::Script => SearchContext::Many(&target.script),
            SearchScope::Title => SearchContext::One(&target.title),
            SearchScope::Cookies => SearchContext::One(&target.raw_cookies),
            SearchScope::HeaderKey(key) => SearchContext::One(target.header(key)?),
            SearchScope::MetaKey(key) => SearchContext::One(target.meta.get(key)?.as_str()),
            SearchScope::CookieKey(key) => {
                SearchContext::One(target.cookies.get(key)?.as_str())
            }
        })
    }
}
