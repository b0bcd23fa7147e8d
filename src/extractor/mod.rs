//! 提取模块：HTML内容提取
pub mod html_extractor;

pub use self::html_extractor::HtmlExtractor;
