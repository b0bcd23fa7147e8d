//! 规则分析器
//! 运行单条规则的全部匹配项，依据条件表达式（缺省OR语义）给出规则判定

use std::collections::HashMap;

use tracing::warn;

use super::matcher::MatchEvaluator;
use crate::condition;
use crate::config::Aggression;
use crate::rule::model::{Detection, Rule};
use crate::target::TargetCache;

/// 侵入模式gating专用的custom分类名
pub const CUSTOM_ORIGIN: &str = "custom";

/// 规则分析器
pub struct RuleAnalyzer;

impl RuleAnalyzer {
    /// 评估单条规则，命中返回Detection
    /// 匹配项之间相互独立，全部执行、不短路；
    /// 版本/detail取最后一个命中且有值的匹配项（后者覆盖前者）
    pub async fn check_rule(
        rule: &Rule,
        base_url: &str,
        cache: &TargetCache,
        aggression: Aggression,
    ) -> Option<Detection> {
        let aggressive = match aggression {
            Aggression::Always => true,
            Aggression::CustomOnly => rule.origin == CUSTOM_ORIGIN,
            Aggression::Passive => false,
        };

        let mut cond_map: HashMap<String, bool> = HashMap::new();
        let mut version = None;
        let mut detail = None;

        for (index, spec) in rule.matches.iter().enumerate() {
            let outcome = MatchEvaluator::check(spec, base_url, cache, aggressive).await;
            if outcome.matched {
                if outcome.version.is_some() {
                    version = outcome.version;
                }
                if outcome.detail.is_some() {
                    detail = outcome.detail;
                }
            }
            cond_map.insert(index.to_string(), outcome.matched);
        }

        let verdict = match &rule.condition {
            // 缺省语义：任一匹配项命中即命中
            None => cond_map.values().any(|matched| *matched),
            Some(expression) => match condition::evaluate(expression, &cond_map) {
                Ok(value) => value,
                Err(e) => {
                    warn!("规则 {} 条件求值失败：{}", rule.key(), e);
                    false
                }
            },
        };

        if !verdict {
            return None;
        }

        Some(Detection {
            name: rule.name.clone(),
            origin: rule.origin.clone(),
            version,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchedPage;
    use crate::fetcher::stub::StubFetcher;
    use std::collections::HashMap;
    use std::sync::Arc;

    const BASE_URL: &str = "http://example.com/";

    async fn seeded_cache() -> Arc<TargetCache> {
        let mut pages = HashMap::new();
        pages.insert(
            BASE_URL.to_string(),
            FetchedPage {
                status: 200,
                headers: vec![("Server".to_string(), "nginx/1.21.6".to_string())],
                body: b"<html><body>jQuery v3.6.0 and wp-content assets</body></html>"
                    .to_vec(),
                final_url: BASE_URL.to_string(),
            },
        );
        let cache = Arc::new(TargetCache::new(Arc::new(StubFetcher::new(pages))));
        cache.get_or_fetch(BASE_URL).await.unwrap();
        cache
    }

    fn rule(json: &str, origin: &str) -> Rule {
        let mut rule: Rule = serde_json::from_str(json).unwrap();
        rule.origin = origin.to_string();
        rule.compile().unwrap();
        rule
    }

    #[tokio::test]
    async fn test_default_or_semantics() {
        let cache = seeded_cache().await;
        // 匹配结果 [false, true, false] -> 命中
        let rule = rule(
            r#"{"name": "jQuery", "matches": [
                {"text": "no-such-token"},
                {"text": "jQuery"},
                {"status": 404}
            ]}"#,
            "frontend",
        );

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_some());
        assert_eq!(detection.unwrap().origin, "frontend");
    }

    #[tokio::test]
    async fn test_all_false_is_no_detection() {
        let cache = seeded_cache().await;
        let rule = rule(
            r#"{"name": "Ghost", "matches": [{"text": "no-such"}, {"status": 500}]}"#,
            "cms",
        );

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_condition_overrides_or() {
        let cache = seeded_cache().await;
        // 0命中、1不命中：条件"0 and 1"应判为不命中
        let rule = rule(
            r#"{"name": "Strict", "condition": "0 and 1", "matches": [
                {"text": "jQuery"},
                {"text": "no-such-token"}
            ]}"#,
            "test",
        );

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_condition_not_expression() {
        let cache = seeded_cache().await;
        let rule = rule(
            r#"{"name": "Negated", "condition": "0 and not 1", "matches": [
                {"text": "jQuery"},
                {"text": "no-such-token"}
            ]}"#,
            "test",
        );

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_some());
    }

    #[tokio::test]
    async fn test_malformed_condition_is_no_match() {
        let cache = seeded_cache().await;
        // 条件引用不存在的下标，属于规则错误 -> 视为不命中，不报错
        let rule = rule(
            r#"{"name": "Broken", "condition": "0 and 7", "matches": [{"text": "jQuery"}]}"#,
            "test",
        );

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_last_match_wins_version_and_detail() {
        let cache = seeded_cache().await;
        let rule = rule(
            r#"{"name": "Layered", "matches": [
                {"regexp": "jQuery v(?P<version>[\\d.]+)"},
                {"text": "wp-content", "version": "override-2.0"}
            ]}"#,
            "test",
        );

        let detection = RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive)
            .await
            .unwrap();
        // 后命中的匹配项覆盖先前的版本与detail
        assert_eq!(detection.version, Some("override-2.0".to_string()));
        assert!(detection.detail.unwrap().contains("wp-content"));
    }

    #[tokio::test]
    async fn test_empty_matches_never_hits() {
        let cache = seeded_cache().await;
        let rule = rule(r#"{"name": "Empty", "matches": []}"#, "test");

        let detection =
            RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive).await;
        assert!(detection.is_none());
    }

    #[tokio::test]
    async fn test_idempotent_evaluation() {
        // 同一规则对同一缓存重复评估，结果完全一致
        let cache = seeded_cache().await;
        let rule = rule(
            r#"{"name": "jQuery", "matches": [{"regexp": "jQuery v(?P<version>[\\d.]+)"}]}"#,
            "frontend",
        );

        let first = RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive)
            .await
            .unwrap();
        let second = RuleAnalyzer::check_rule(&rule, BASE_URL, &cache, Aggression::Passive)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.request_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_only_aggression_gating() {
        // CustomOnly模式：仅custom分类的规则允许二级抓取
        let cache = seeded_cache().await;
        let rule_json =
            r#"{"name": "Probe", "matches": [{"text": "jQuery", "url": "/probe/"}]}"#;

        let custom_rule = rule(rule_json, "custom");
        let other_rule = rule(rule_json, "cms");

        // custom规则尝试抓取（桩里没有该URL，抓取失败 -> 不命中，但发生了请求）
        let before = cache.request_count();
        RuleAnalyzer::check_rule(&custom_rule, BASE_URL, &cache, Aggression::CustomOnly).await;
        assert_eq!(cache.request_count(), before + 1);

        // 非custom规则不发请求
        let before = cache.request_count();
        RuleAnalyzer::check_rule(&other_rule, BASE_URL, &cache, Aggression::CustomOnly).await;
        assert_eq!(cache.request_count(), before);
    }
}
