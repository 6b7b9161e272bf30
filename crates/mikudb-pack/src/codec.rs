//! 编解码契约模块
//!
//! 各格式编码器共享的分派约定：`write_any` 按值的变体路由到具体的 `write_*` 方法，
//! 解码器则只根据前导类型字节路由，从不依赖调用方的期望类型。

use crate::value::{PackMap, PackValue};
use mikudb_common::{PackError, PackResult, Writer};

/// 原型污染敏感键，对象解码遇到该键时直接拒绝
pub const UNSAFE_KEY: &str = "__proto__";

/// 校验解码出的对象键
pub fn guard_key(key: &str) -> PackResult<()> {
    if key == UNSAFE_KEY {
        return Err(PackError::SecurityRejection(key.to_string()));
    }
    Ok(())
}

/// 字符串编码后的最大字节数：每个 UTF-16 码元按 4 字节估算
///
/// 字符串头的长度类别按这个上界选定，写完字节后再回填实际长度。
pub(crate) fn max_utf8_len(s: &str) -> usize {
    s.encode_utf16().count() * 4
}

/// 二进制 JSON 编码器
///
/// `encode` 在每次调用开始时清空写入器，因此编码器实例可以反复使用，
/// 但不能被多个调用方同时使用。
pub trait BinaryJsonEncoder {
    fn writer(&mut self) -> &mut Writer;

    fn write_any(&mut self, value: &PackValue) -> PackResult<()>;

    fn write_null(&mut self);

    fn write_undefined(&mut self);

    fn write_boolean(&mut self, b: bool);

    fn write_integer(&mut self, n: i64);

    fn write_float(&mut self, f: f64);

    /// 整数值的浮点数走整数编码，其余走浮点编码
    fn write_number(&mut self, n: f64) {
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
            self.write_integer(n as i64);
        } else {
            self.write_float(n);
        }
    }

    fn write_str(&mut self, s: &str);

    fn write_bin(&mut self, b: &[u8]);

    fn write_arr(&mut self, arr: &[PackValue]) -> PackResult<()>;

    fn write_obj(&mut self, obj: &PackMap) -> PackResult<()>;

    /// 在写入器当前位置写入一个顶层值，不清空写入器
    fn write_root(&mut self, value: &PackValue) -> PackResult<()> {
        self.write_any(value)
    }

    fn encode(&mut self, value: &PackValue) -> PackResult<Vec<u8>> {
        self.writer().reset();
        self.write_root(value)?;
        Ok(self.writer().flush())
    }
}

/// 支持流式写入的编码器
///
/// 容器和字符串可以先写开始标记，再分块写入内容，最后写结束标记。
pub trait StreamingBinaryJsonEncoder: BinaryJsonEncoder {
    fn write_start_arr(&mut self);
    fn write_arr_chunk(&mut self, item: &PackValue) -> PackResult<()>;
    fn write_end_arr(&mut self);

    fn write_start_obj(&mut self);
    fn write_obj_chunk(&mut self, key: &str, value: &PackValue) -> PackResult<()>;
    fn write_end_obj(&mut self);

    fn write_start_str(&mut self);
    fn write_str_chunk(&mut self, chunk: &str);
    fn write_end_str(&mut self) -> PackResult<()>;

    fn write_start_bin(&mut self);
    fn write_bin_chunk(&mut self, chunk: &[u8]);
    fn write_end_bin(&mut self) -> PackResult<()>;
}

/// 二进制 JSON 解码器
pub trait BinaryJsonDecoder {
    /// 从当前游标读取一个完整的值
    fn read_any(&mut self) -> PackResult<PackValue>;

    /// 当前游标位置
    fn position(&self) -> usize;
}

/// 嵌套深度计数器
#[derive(Debug, Clone, Copy)]
pub(crate) struct Depth {
    current: usize,
    max: usize,
}

impl Depth {
    pub(crate) fn new(max: usize) -> Self {
        Self { current: 0, max }
    }

    pub(crate) fn enter(&mut self) -> PackResult<()> {
        if self.current >= self.max {
            return Err(PackError::NestingTooDeep(self.max));
        }
        self.current += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.current = 0;
    }
}

/// 数值转为对象键文本
pub(crate) fn key_from_value(value: PackValue) -> PackResult<String> {
    match value {
        PackValue::Str(s) => Ok(s),
        PackValue::Int(n) => Ok(n.to_string()),
        PackValue::Float(n) => Ok(n.to_string()),
        PackValue::Bool(b) => Ok(b.to_string()),
        PackValue::Null => Ok("null".to_string()),
        other => Err(PackError::malformed(format!(
            "unsupported object key type: {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_key() {
        assert!(guard_key("name").is_ok());
        assert!(matches!(
            guard_key("__proto__"),
            Err(PackError::SecurityRejection(_))
        ));
    }

    #[test]
    fn test_depth() {
        let mut depth = Depth::new(2);
        depth.enter().unwrap();
        depth.enter().unwrap();
        assert!(matches!(depth.enter(), Err(PackError::NestingTooDeep(2))));
        depth.leave();
        assert!(depth.enter().is_ok());
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(key_from_value(PackValue::Int(7)).unwrap(), "7");
        assert!(key_from_value(PackValue::Arr(vec![])).is_err());
    }

    #[test]
    fn test_write_number_routes_integral_floats() {
        use crate::cbor::CborEncoder;
        use crate::msgpack::MsgPackEncoder;

        let mut encoder = MsgPackEncoder::full();
        encoder.write_number(2.0);
        encoder.write_number(-40.0);
        encoder.write_number(2.5);
        encoder.write_number(f64::NAN);
        let bytes = encoder.writer().flush();
        assert_eq!(&bytes[..3], &[0x02, 0xd0, 0xd8]);
        assert_eq!(bytes[3], 0xcb);
        assert_eq!(&bytes[4..12], &2.5f64.to_be_bytes());
        assert_eq!(bytes[12], 0xcb);
        assert_eq!(bytes.len(), 21);

        let mut encoder = CborEncoder::full();
        encoder.write_number(2.0);
        encoder.write_number(1e300);
        let bytes = encoder.writer().flush();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1], 0xfb);
    }
}
