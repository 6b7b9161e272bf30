//! MessagePack 浅层导航
//!
//! 按路径定位子值时只读取沿途的容器头部和兄弟节点的长度，除非字符串键外
//! 不物化任何未命中的值。导航器组合一个 [`MsgPackDecoder`]，复用它的
//! `skip_any` 与头部读取原语。

use super::constants::is_str;
use super::decoder::MsgPackDecoder;
use crate::value::PackValue;
use mikudb_common::{PackError, PackResult};
use std::fmt;
use tracing::trace;

/// 路径片段：对象键或数组下标
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// MessagePack 路径导航器
///
/// # 示例
///
/// ```rust
/// use mikudb_pack::msgpack::{self, MsgPackNavigator, PathSegment};
/// use mikudb_pack::pack;
///
/// let bytes = msgpack::encode(&pack!({ "tags": ["a", "b", "c"] })).unwrap();
/// let mut nav = MsgPackNavigator::new(&bytes);
/// let value = nav
///     .find(&[PathSegment::from("tags"), PathSegment::from(1)])
///     .unwrap()
///     .read_any()
///     .unwrap();
/// assert_eq!(value, pack!("b"));
/// ```
#[derive(Debug, Clone)]
pub struct MsgPackNavigator<'a> {
    decoder: MsgPackDecoder<'a>,
}

impl<'a> MsgPackNavigator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            decoder: MsgPackDecoder::new(data),
        }
    }

    pub fn from_decoder(decoder: MsgPackDecoder<'a>) -> Self {
        Self { decoder }
    }

    pub fn into_decoder(self) -> MsgPackDecoder<'a> {
        self.decoder
    }

    /// 回到输入开头
    pub fn rewind(&mut self) {
        self.decoder.reader_mut().set_position(0);
    }

    pub fn position(&self) -> usize {
        self.decoder.reader().position()
    }

    pub fn read_obj_header(&mut self) -> PackResult<usize> {
        self.decoder.read_obj_header()
    }

    pub fn read_arr_header(&mut self) -> PackResult<usize> {
        self.decoder.read_arr_header()
    }

    pub fn read_str_header(&mut self) -> PackResult<usize> {
        self.decoder.read_str_header()
    }

    pub fn skip_any(&mut self) -> PackResult<usize> {
        self.decoder.skip_any()
    }

    /// 物化游标处的值
    pub fn read_any(&mut self) -> PackResult<PackValue> {
        self.decoder.read_any()
    }

    /// 游标须位于 map 上，定位到键 `key` 对应的值
    pub fn find_key(&mut self, key: &str) -> PackResult<&mut Self> {
        let len = self.decoder.read_obj_header()?;
        for _ in 0..len {
            if self.key_matches(key)? {
                trace!("Shallow key hit: {} at offset {}", key, self.position());
                return Ok(self);
            }
            self.decoder.skip_any()?;
        }
        Err(PackError::PathNotFound(format!("key {:?}", key)))
    }

    /// 读取一个键并与 `key` 比较
    ///
    /// 字符串键逐字节比较；非字符串键按完整解码的规则转成文本后再比较。
    fn key_matches(&mut self, key: &str) -> PackResult<bool> {
        let reader = self.decoder.reader();
        if !is_str(reader.peek()?) {
            return Ok(self.decoder.read_key()? == key);
        }
        let len = self.decoder.read_str_header()?;
        let bytes = self.decoder.reader_mut().buf(len)?;
        Ok(bytes == key.as_bytes())
    }

    /// 游标须位于 array 上，定位到第 `index` 个元素
    pub fn find_index(&mut self, index: usize) -> PackResult<&mut Self> {
        let len = self.decoder.read_arr_header()?;
        if index >= len {
            return Err(PackError::PathNotFound(format!(
                "index {} out of bounds (len {})",
                index, len
            )));
        }
        for _ in 0..index {
            self.decoder.skip_any()?;
        }
        trace!("Shallow index hit: {} at offset {}", index, self.position());
        Ok(self)
    }

    /// 依次应用路径片段，结束时游标位于目标值的首字节
    pub fn find(&mut self, path: &[PathSegment]) -> PackResult<&mut Self> {
        for segment in path {
            match segment {
                PathSegment::Key(key) => self.find_key(key)?,
                PathSegment::Index(index) => self.find_index(*index)?,
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgpack::encode;
    use crate::pack;

    fn path(segments: &[PathSegment]) -> Vec<PathSegment> {
        segments.to_vec()
    }

    #[test]
    fn test_find_nested() {
        let bytes = encode(&pack!({
            "id": 123,
            "user": { "name": "miku", "tags": ["a", "b", "c"] }
        }))
        .unwrap();
        let mut nav = MsgPackNavigator::new(&bytes);
        let p = path(&["user".into(), "tags".into(), 2.into()]);
        assert_eq!(nav.find(&p).unwrap().read_any().unwrap(), pack!("c"));

        nav.rewind();
        let p = path(&["user".into()]);
        let user = nav.find(&p).unwrap().read_any().unwrap();
        assert_eq!(user.get("name"), Some(&pack!("miku")));
    }

    #[test]
    fn test_missing_key() {
        let bytes = encode(&pack!({ "a": 1 })).unwrap();
        let err = MsgPackNavigator::new(&bytes).find_key("b").unwrap_err();
        assert!(matches!(err, PackError::PathNotFound(_)));
    }

    #[test]
    fn test_index_out_of_range() {
        let bytes = encode(&pack!([1, 2])).unwrap();
        let err = MsgPackNavigator::new(&bytes).find_index(2).unwrap_err();
        assert!(matches!(err, PackError::PathNotFound(_)));
    }

    #[test]
    fn test_wrong_container_kind() {
        let bytes = encode(&pack!([1, 2])).unwrap();
        let mut nav = MsgPackNavigator::new(&bytes);
        assert!(matches!(
            nav.find_key("a"),
            Err(PackError::MalformedInput(_))
        ));
        assert_eq!(nav.position(), 0);
    }

    #[test]
    fn test_key_prefix_does_not_match() {
        let bytes = encode(&pack!({ "ab": 1, "a": 2 })).unwrap();
        let mut nav = MsgPackNavigator::new(&bytes);
        assert_eq!(nav.find_key("a").unwrap().read_any().unwrap(), pack!(2));
    }

    #[test]
    fn test_non_string_keys_match_as_text() {
        // {1: 2, "k": 3}
        let bytes = [0x82, 0x01, 0x02, 0xa1, b'k', 0x03];
        let mut nav = MsgPackNavigator::new(&bytes);
        assert_eq!(nav.find_key("k").unwrap().read_any().unwrap(), pack!(3));

        nav.rewind();
        assert_eq!(nav.find_key("1").unwrap().read_any().unwrap(), pack!(2));

        // {1: "a"}，与完整解码得到的键一致
        let bytes = [0x81, 0x01, 0xa1, b'a'];
        let full = crate::msgpack::decode(&bytes).unwrap();
        assert_eq!(full.get("1"), Some(&pack!("a")));
        let mut nav = MsgPackNavigator::new(&bytes);
        assert_eq!(nav.find_key("1").unwrap().read_any().unwrap(), pack!("a"));

        // true 键转成 "true"
        let bytes = [0x81, 0xc3, 0x05];
        let mut nav = MsgPackNavigator::new(&bytes);
        assert_eq!(nav.find_key("true").unwrap().read_any().unwrap(), pack!(5));
    }

    #[test]
    fn test_path_display() {
        assert_eq!(PathSegment::from("a").to_string(), "a");
        assert_eq!(PathSegment::from(3).to_string(), "[3]");
    }
}
