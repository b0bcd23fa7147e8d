//! 规则数据模型定义
//! 规则/匹配项在加载时完成校验与正则编译，运行期只读

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::WaResult;

/// 匹配项的搜索范围（加载时从search字段解析）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// 响应体文本（默认）
    #[default]
    Body,
    /// 原始响应（头文本+响应体）
    All,
    /// 原始响应头文本
    Headers,
    /// script的src列表
    Script,
    /// 页面title
    Title,
    /// Set-Cookie原始文本
    Cookies,
    /// 指定响应头的值
    HeaderKey(String),
    /// 指定meta标签的content
    MetaKey(String),
    /// 指定cookie的值
    CookieKey(String),
}

impl SearchScope {
    /// 解析search选择器字符串，无法识别的选择器回退为Body
    pub fn parse(selector: Option<&str>) -> Self {
        let Some(selector) = selector else {
            return SearchScope::Body;
        };

        match selector {
            "all" => SearchScope::All,
            "headers" => SearchScope::Headers,
            "script" => SearchScope::Script,
            "title" => SearchScope::Title,
            "cookies" => SearchScope::Cookies,
            other if other.ends_with(']') => {
                for (prefix, build) in [
                    ("headers[", SearchScope::HeaderKey as fn(String) -> SearchScope),
                    ("meta[", SearchScope::MetaKey as fn(String) -> SearchScope),
                    ("cookies[", SearchScope::CookieKey as fn(String) -> SearchScope),
                ] {
                    if let Some(rest) = other.strip_prefix(prefix) {
                        let key = rest.trim_end_matches(']').to_string();
                        return build(key);
                    }
                }
                SearchScope::Body
            }
            _ => SearchScope::Body,
        }
    }

    /// 范围描述（用于detail文本）
    pub fn describe(&self) -> String {
        match self {
            SearchScope::Body => "body".to_string(),
            SearchScope::All => "all".to_string(),
            SearchScope::Headers => "headers".to_string(),
            SearchScope::Script => "script".to_string(),
            SearchScope::Title => "title".to_string(),
            SearchScope::Cookies => "cookies".to_string(),
            SearchScope::HeaderKey(key) => format!("headers[{}]", key),
            SearchScope::MetaKey(key) => format!("meta[{}]", key),
            SearchScope::CookieKey(key) => format!("cookies[{}]", key),
        }
    }
}

/// 单个签名匹配项
/// regexp/text/md5/status四类检测键至少声明一个，否则该匹配项无效、恒为false
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchSpec {
    /// 相对/绝对URL，缺省表示检测主目标
    #[serde(default)]
    pub url: Option<String>,
    /// 搜索范围选择器原文
    #[serde(default)]
    pub search: Option<String>,
    /// 正则模式原文
    #[serde(default)]
    pub regexp: Option<String>,
    /// 字面文本包含检测
    #[serde(default)]
    pub text: Option<String>,
    /// 响应体md5摘要检测
    #[serde(default)]
    pub md5: Option<String>,
    /// 状态码检测
    #[serde(default)]
    pub status: Option<u16>,
    /// 字面版本提示（正则提取成功时被覆盖）
    #[serde(default)]
    pub version: Option<String>,
    /// 版本提取的捕获分组偏移
    #[serde(default)]
    pub offset: Option<usize>,
    /// 置信度（仅作信息展示，缺省100）
    #[serde(default)]
    pub certainty: Option<u8>,

    /// 编译后的正则（加载时填充，忽略大小写）
    #[serde(skip)]
    pub pattern: Option<Regex>,
    /// 解析后的搜索范围（加载时填充）
    #[serde(skip)]
    pub scope: SearchScope,
}

impl MatchSpec {
    /// 加载期处理：编译正则、解析搜索范围、补默认置信度
    pub fn compile(&mut self) -> WaResult<()> {
        if let Some(source) = &self.regexp {
            self.pattern = Some(
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()?,
            );
        }
        self.scope = SearchScope::parse(self.search.as_deref());
        if self.certainty.is_none() {
            self.certainty = Some(100);
        }
        Ok(())
    }

    /// 是否声明了至少一种检测键
    pub fn has_primary_kind(&self) -> bool {
        self.regexp.is_some()
            || self.text.is_some()
            || self.md5.is_some()
            || self.status.is_some()
    }
}

/// implies/excludes兼容字符串或字符串数组两种JSON写法
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrSeq>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrSeq::One(value)) => vec![value],
        Some(StringOrSeq::Many(values)) => values,
    })
}

/// 技术签名规则
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// 技术名称
    pub name: String,
    /// 来源分类（由规则目录的一级子目录得出，加载时填充）
    #[serde(skip)]
    pub origin: String,
    /// 规则描述
    #[serde(default)]
    pub desc: Option<String>,
    /// 有序匹配项列表
    #[serde(default)]
    pub matches: Vec<MatchSpec>,
    /// 布尔条件表达式，缺省为OR语义
    #[serde(default)]
    pub condition: Option<String>,
    /// 命中后附带报告的技术名
    #[serde(default, deserialize_with = "string_or_seq")]
    pub implies: Vec<String>,
    /// 命中后需要抑制的技术名
    #[serde(default, deserialize_with = "string_or_seq")]
    pub excludes: Vec<String>,
}

impl Rule {
    /// 规则唯一键：同名技术允许出现在不同分类下
    pub fn key(&self) -> String {
        format!("{}_{}", self.origin, self.name)
    }

    /// 按分类+名称拼接唯一键（跨分类查找implies目标时使用）
    pub fn make_key(origin: &str, name: &str) -> String {
        format!("{}_{}", origin, name)
    }

    /// 编译全部匹配项
    pub fn compile(&mut self) -> WaResult<()> {
        for spec in &mut self.matches {
            spec.compile()?;
        }
        Ok(())
    }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ======== 为 Detection 实现 Display trait（用于 CLI / Report 输出） ========
impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}
