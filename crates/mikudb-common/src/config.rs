//! 编解码配置模块
//!
//! 定义编码器、解码器共享的资源限制与缓冲区参数。

use crate::error::{PackError, PackResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;
pub const DEFAULT_MAX_STRING_LENGTH: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_CONTAINER_LENGTH: usize = 1_000_000;
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// 编解码配置
///
/// 所有字段都有默认值，JSON 中缺省的字段使用默认值填充。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// 容器最大嵌套层级
    pub max_nesting_depth: usize,
    /// 字符串和二进制数据的最大字节数
    pub max_string_length: usize,
    /// 数组和对象的最大元素个数
    pub max_container_length: usize,
    /// Writer 初始容量
    pub initial_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_container_length: DEFAULT_MAX_CONTAINER_LENGTH,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl CodecConfig {
    /// 从 JSON 字符串加载配置
    ///
    /// # Arguments
    /// * `json` - JSON 格式的配置文本
    ///
    /// # Returns
    /// 校验通过的配置，解析失败或校验失败返回 `PackError::Config`
    pub fn from_json_str(json: &str) -> PackResult<Self> {
        let config: CodecConfig =
            serde_json::from_str(json).map_err(|e| PackError::Config(e.to_string()))?;
        config.validate()?;
        debug!("Loaded codec config: {:?}", config);
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> PackResult<()> {
        if self.max_nesting_depth == 0 {
            return Err(PackError::Config("max_nesting_depth must be positive".into()));
        }
        if self.max_string_length == 0 {
            return Err(PackError::Config("max_string_length must be positive".into()));
        }
        if self.max_container_length == 0 {
            return Err(PackError::Config(
                "max_container_length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// 检查字符串/二进制长度
    pub fn check_string_length(&self, len: usize) -> PackResult<()> {
        if len > self.max_string_length {
            return Err(PackError::LimitExceeded {
                what: "String",
                len,
                max: self.max_string_length,
            });
        }
        Ok(())
    }

    /// 检查容器元素个数
    pub fn check_container_length(&self, len: usize) -> PackResult<()> {
        if len > self.max_container_length {
            return Err(PackError::LimitExceeded {
                what: "Container",
                len,
                max: self.max_container_length,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CodecConfig::from_json_str(r#"{"max_nesting_depth": 8}"#).unwrap();
        assert_eq!(config.max_nesting_depth, 8);
        assert_eq!(config.max_string_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = CodecConfig::from_json_str(r#"{"max_container_length": 0}"#).unwrap_err();
        assert!(matches!(err, PackError::Config(_)));
    }

    #[test]
    fn test_limits() {
        let config = CodecConfig {
            max_string_length: 4,
            ..CodecConfig::default()
        };
        assert!(config.check_string_length(4).is_ok());
        assert!(matches!(
            config.check_string_length(5),
            Err(PackError::LimitExceeded { len: 5, max: 4, .. })
        ));
    }
}
