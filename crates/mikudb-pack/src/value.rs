//! 值模型定义模块
//!
//! 定义所有编解码器共享的 `PackValue`：JSON 兼容的基础类型，
//! 加上少量格式专属的逃逸类型（扩展值、预编码字节、BSON 特殊值）。

use crate::bson::BsonValue;
use indexmap::IndexMap;
use std::fmt;

/// 有序对象类型，保持键的插入顺序
pub type PackMap = IndexMap<String, PackValue>;

/// 编解码值
///
/// 键顺序影响编码输出，但不影响相等性比较（`IndexMap` 的相等性与顺序无关）。
///
/// # 示例
///
/// ```rust
/// use mikudb_pack::{pack, PackValue};
///
/// let value = pack!({ "id": 123, "tags": ["a", "b"] });
/// assert_eq!(value.get_path("tags.1"), Some(&PackValue::from("b")));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PackValue {
    /// 空值
    #[default]
    Null,
    /// 未定义值（CBOR、MessagePack 有对应标记，其他格式写作 null）
    Undefined,
    /// 布尔值
    Bool(bool),
    /// 64 位有符号整数
    Int(i64),
    /// 64 位浮点数
    Float(f64),
    /// UTF-8 字符串
    Str(String),
    /// 二进制数据
    Bin(Vec<u8>),
    /// 数组
    Arr(Vec<PackValue>),
    /// 对象（有序键值对）
    Obj(PackMap),
    /// 扩展值：MessagePack ext 或 CBOR tag
    Ext(Extension),
    /// 已编码为目标格式的字节，编码时原样拼接
    Raw(Vec<u8>),
    /// BSON 专属值
    Bson(BsonValue),
}

/// 扩展值
///
/// MessagePack 中 `tag` 是 ext 类型字节，`value` 必须是 `Bin`；
/// CBOR 中 `tag` 是标签号，`value` 是被标记的任意值。
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub tag: u64,
    pub value: Box<PackValue>,
}

impl Extension {
    pub fn new(tag: u64, value: PackValue) -> Self {
        Self {
            tag,
            value: Box::new(value),
        }
    }
}

impl PackValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            PackValue::Null => "null",
            PackValue::Undefined => "undefined",
            PackValue::Bool(_) => "boolean",
            PackValue::Int(_) => "integer",
            PackValue::Float(_) => "float",
            PackValue::Str(_) => "string",
            PackValue::Bin(_) => "binary",
            PackValue::Arr(_) => "array",
            PackValue::Obj(_) => "object",
            PackValue::Ext(_) => "extension",
            PackValue::Raw(_) => "raw",
            PackValue::Bson(b) => b.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PackValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PackValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PackValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// 数值类型统一转为 f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PackValue::Float(n) => Some(*n),
            PackValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PackValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PackValue::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<PackValue>> {
        match self {
            PackValue::Arr(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PackMap> {
        match self {
            PackValue::Obj(obj) => Some(obj),
            _ => None,
        }
    }

    /// 获取对象的字段，或数组中以十进制字符串表示的下标
    pub fn get(&self, key: &str) -> Option<&PackValue> {
        match self {
            PackValue::Obj(obj) => obj.get(key),
            PackValue::Arr(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    /// 按点分隔路径获取嵌套值，如 `"user.tags.0"`
    pub fn get_path(&self, path: &str) -> Option<&PackValue> {
        path.split('.').try_fold(self, |current, part| current.get(part))
    }
}

impl fmt::Display for PackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackValue::Null => write!(f, "null"),
            PackValue::Undefined => write!(f, "undefined"),
            PackValue::Bool(b) => write!(f, "{}", b),
            PackValue::Int(n) => write!(f, "{}", n),
            PackValue::Float(n) => write!(f, "{}", n),
            PackValue::Str(s) => write!(f, "{:?}", s),
            PackValue::Bin(b) => write!(f, "<binary:{} bytes>", b.len()),
            PackValue::Arr(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            PackValue::Obj(obj) => {
                write!(f, "{{")?;
                for (i, (k, v)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            PackValue::Ext(ext) => write!(f, "Ext({}, {})", ext.tag, ext.value),
            PackValue::Raw(b) => write!(f, "<raw:{} bytes>", b.len()),
            PackValue::Bson(b) => write!(f, "{}", b),
        }
    }
}

// ============================================================================
// From 特征实现
// ============================================================================

impl From<bool> for PackValue {
    fn from(v: bool) -> Self {
        PackValue::Bool(v)
    }
}

impl From<i32> for PackValue {
    fn from(v: i32) -> Self {
        PackValue::Int(v as i64)
    }
}

impl From<i64> for PackValue {
    fn from(v: i64) -> Self {
        PackValue::Int(v)
    }
}

impl From<u32> for PackValue {
    fn from(v: u32) -> Self {
        PackValue::Int(v as i64)
    }
}

impl From<f64> for PackValue {
    fn from(v: f64) -> Self {
        PackValue::Float(v)
    }
}

impl From<&str> for PackValue {
    fn from(v: &str) -> Self {
        PackValue::Str(v.to_string())
    }
}

impl From<String> for PackValue {
    fn from(v: String) -> Self {
        PackValue::Str(v)
    }
}

impl From<Vec<u8>> for PackValue {
    fn from(v: Vec<u8>) -> Self {
        PackValue::Bin(v)
    }
}

impl From<PackMap> for PackValue {
    fn from(v: PackMap) -> Self {
        PackValue::Obj(v)
    }
}

impl From<Extension> for PackValue {
    fn from(v: Extension) -> Self {
        PackValue::Ext(v)
    }
}

impl From<BsonValue> for PackValue {
    fn from(v: BsonValue) -> Self {
        PackValue::Bson(v)
    }
}

impl<T: Into<PackValue>> From<Option<T>> for PackValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PackValue::Null, Into::into)
    }
}

impl FromIterator<PackValue> for PackValue {
    fn from_iter<I: IntoIterator<Item = PackValue>>(iter: I) -> Self {
        PackValue::Arr(iter.into_iter().collect())
    }
}

impl FromIterator<(String, PackValue)> for PackValue {
    fn from_iter<I: IntoIterator<Item = (String, PackValue)>>(iter: I) -> Self {
        PackValue::Obj(iter.into_iter().collect())
    }
}

/// 构造 PackValue 的便捷宏
///
/// ```rust
/// use mikudb_pack::pack;
///
/// let doc = pack!({ "name": "miku", "tags": [1, 2.5, null, true] });
/// assert_eq!(doc.get_path("tags.0").and_then(|v| v.as_i64()), Some(1));
/// ```
#[macro_export]
macro_rules! pack {
    (null) => {
        $crate::PackValue::Null
    };
    (true) => {
        $crate::PackValue::Bool(true)
    };
    (false) => {
        $crate::PackValue::Bool(false)
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::PackValue::Arr(vec![ $($crate::pack!($elem)),* ])
    };
    ({ $($key:literal : $value:tt),* $(,)? }) => {
        {
            #[allow(unused_mut)]
            let mut obj = $crate::PackMap::new();
            $(
                obj.insert(::std::string::String::from($key), $crate::pack!($value));
            )*
            $crate::PackValue::Obj(obj)
        }
    };
    ($e:expr) => {
        $crate::PackValue::from($e)
    };
}
