//! 工具模块：响应头转换、版本提取
pub mod header_converter;
pub mod version_extractor;

pub use self::header_converter::HeaderConverter;
pub use self::version_extractor::VersionExtractor;
