//! 响应头转换工具
//! 负责把有序响应头序列化为可搜索文本，并提取Cookie信息

use std::collections::HashMap;

/// 响应头转换工具类
pub struct HeaderConverter;

impl HeaderConverter {
    /// 序列化为原始头文本（每行 "name: value"，保持响应顺序）
    pub fn to_raw(headers: &[(String, String)]) -> String {
        headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 拼接全部Set-Cookie头的原始文本（多个以", "连接）
    pub fn raw_cookies(headers: &[(String, String)]) -> String {
        headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 解析Set-Cookie头为 cookie名 -> 值 映射
    /// 仅取每条Set-Cookie第一段的name=value，属性（path/expires等）忽略
    pub fn cookie_map(headers: &[(String, String)]) -> HashMap<String, String> {
        let mut cookies = HashMap::new();

        for (name, value) in headers {
            if !name.eq_ignore_ascii_case("set-cookie") {
                continue;
            }

            let Some(first_pair) = value.split(';').next() else {
                continue;
            };
            if let Some((cookie_name, cookie_value)) = first_pair.split_once('=') {
                cookies.insert(
                    cookie_name.trim().to_string(),
                    cookie_value.trim().to_string(),
                );
            }
        }

        cookies
    }

    /// 查询指定响应头的值（大小写不敏感，取第一个命中）
    pub fn get<'a>(headers: &'a [(String, String)], key: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}
