//! 错误类型定义模块
//!
//! 定义编解码器共享的错误类型 PackError 和 Result 别名。
//! 所有错误都在检测点立即返回，不做内部重试，也不返回部分结果。

use std::fmt;
use thiserror::Error;

/// 编解码错误类型
///
/// 每个变体都归属于 [`PackErrorKind`] 中的一个大类，调用方可以据此决定处理策略。
#[derive(Error, Debug)]
pub enum PackError {
    /// 输入在读取过程中提前结束
    #[error("Unexpected end of input at offset {offset}: need {need} more bytes")]
    UnexpectedEof { offset: usize, need: usize },

    /// 无法识别的类型标记字节
    #[error("Invalid type marker 0x{marker:02x} at offset {offset}")]
    InvalidTypeMarker { marker: u8, offset: usize },

    /// 结构性错误，例如声明长度与实际内容不符
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// 字符串不是有效的 UTF-8 编码
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 声明的长度超出配置上限
    #[error("{what} too large: {len} > {max}")]
    LimitExceeded {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// 目标格式无法表示该值
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// 对象键被安全策略拒绝
    #[error("Rejected object key: {0:?}")]
    SecurityRejection(String),

    /// 浅解码路径不存在
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Serde 序列化过程错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Serde 反序列化过程错误
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// 配置无效
    #[error("Config error: {0}")]
    Config(String),
}

/// 错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackErrorKind {
    MalformedInput,
    UnsupportedValue,
    SecurityRejection,
    PathNotFound,
    Other,
}

impl PackError {
    /// 返回错误所属的大类
    pub fn kind(&self) -> PackErrorKind {
        match self {
            PackError::UnexpectedEof { .. }
            | PackError::InvalidTypeMarker { .. }
            | PackError::MalformedInput(_)
            | PackError::InvalidUtf8(_)
            | PackError::NestingTooDeep(_)
            | PackError::LimitExceeded { .. } => PackErrorKind::MalformedInput,
            PackError::UnsupportedValue(_) => PackErrorKind::UnsupportedValue,
            PackError::SecurityRejection(_) => PackErrorKind::SecurityRejection,
            PackError::PathNotFound(_) => PackErrorKind::PathNotFound,
            PackError::Serialization(_) | PackError::Deserialization(_) | PackError::Config(_) => {
                PackErrorKind::Other
            }
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        PackError::MalformedInput(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        PackError::UnsupportedValue(msg.into())
    }
}

impl serde::ser::Error for PackError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PackError::Serialization(msg.to_string())
    }
}

impl serde::de::Error for PackError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        PackError::Deserialization(msg.to_string())
    }
}

/// 编解码 Result 类型别名
pub type PackResult<T> = Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PackError::UnexpectedEof { offset: 3, need: 2 }.kind(),
            PackErrorKind::MalformedInput
        );
        assert_eq!(
            PackError::malformed("incorrect length").kind(),
            PackErrorKind::MalformedInput
        );
        assert_eq!(
            PackError::unsupported("root must be an object").kind(),
            PackErrorKind::UnsupportedValue
        );
        assert_eq!(
            PackError::SecurityRejection("__proto__".into()).kind(),
            PackErrorKind::SecurityRejection
        );
        assert_eq!(
            PackError::PathNotFound("tags".into()).kind(),
            PackErrorKind::PathNotFound
        );
    }

    #[test]
    fn test_display() {
        let err = PackError::InvalidTypeMarker {
            marker: 0xc1,
            offset: 7,
        };
        assert_eq!(err.to_string(), "Invalid type marker 0xc1 at offset 7");
    }
}
