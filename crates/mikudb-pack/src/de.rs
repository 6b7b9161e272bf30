//! Serde 反序列化模块
//!
//! 实现 Serde Deserializer trait，将 PackValue 反序列化为 Rust 数据结构。
//!
//! - 整数统一按 i64 交给 visitor，由 visitor 检查目标类型的范围
//! - 浮点目标也接受整数
//! - BSON 定宽数值和 Symbol 按对应的基础类型读取

use crate::bson::BsonValue;
use crate::value::PackValue;
use mikudb_common::PackError;
use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

pub struct Deserializer<'de> {
    input: &'de PackValue,
}

impl<'de> Deserializer<'de> {
    pub fn from_pack(input: &'de PackValue) -> Self {
        Deserializer { input }
    }

    fn mismatch(&self, expected: &str) -> PackError {
        PackError::Deserialization(format!(
            "Expected {}, got {}",
            expected,
            self.input.type_name()
        ))
    }

    fn integer(&self) -> Result<i64, PackError> {
        match self.input {
            PackValue::Int(n) => Ok(*n),
            PackValue::Bson(BsonValue::Int32(n)) => Ok(*n as i64),
            PackValue::Bson(BsonValue::Int64(n)) => Ok(*n),
            _ => Err(self.mismatch("integer")),
        }
    }

    fn float(&self) -> Result<f64, PackError> {
        match self.input {
            PackValue::Float(n) | PackValue::Bson(BsonValue::Float(n)) => Ok(*n),
            _ => self.integer().map(|n| n as f64).map_err(|_| self.mismatch("float")),
        }
    }

    fn string(&self) -> Result<&'de str, PackError> {
        match self.input {
            PackValue::Str(s) | PackValue::Bson(BsonValue::Symbol(s)) => Ok(s.as_str()),
            _ => Err(self.mismatch("string")),
        }
    }
}

/// 将 PackValue 反序列化为 Rust 值
pub fn from_pack_value<'a, T: Deserialize<'a>>(value: &'a PackValue) -> Result<T, PackError> {
    T::deserialize(Deserializer::from_pack(value))
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = PackError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Null | PackValue::Undefined => visitor.visit_unit(),
            PackValue::Bool(b) => visitor.visit_bool(*b),
            PackValue::Int(n) => visitor.visit_i64(*n),
            PackValue::Float(n) => visitor.visit_f64(*n),
            PackValue::Str(s) => visitor.visit_borrowed_str(s),
            PackValue::Bin(b) | PackValue::Raw(b) => visitor.visit_borrowed_bytes(b),
            PackValue::Arr(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            PackValue::Obj(obj) => visitor.visit_map(MapDeserializer::new(obj.iter())),
            PackValue::Bson(BsonValue::Int32(n)) => visitor.visit_i32(*n),
            PackValue::Bson(BsonValue::Int64(n)) => visitor.visit_i64(*n),
            PackValue::Bson(BsonValue::Float(n)) => visitor.visit_f64(*n),
            PackValue::Bson(BsonValue::Symbol(s)) => visitor.visit_borrowed_str(s),
            _ => Err(PackError::Deserialization(format!(
                "Cannot deserialize {} as any",
                self.input.type_name()
            ))),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Bool(b) => visitor.visit_bool(*b),
            _ => Err(self.mismatch("boolean")),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            // 序列化时超出 i64 的 u64 写作浮点数
            PackValue::Float(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64 => {
                visitor.visit_u64(*n as u64)
            }
            _ => visitor.visit_i64(self.integer()?),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f32(self.float()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let s = self.string()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.mismatch("char")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.string()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Bin(b) | PackValue::Raw(b) => visitor.visit_borrowed_bytes(b),
            PackValue::Bson(BsonValue::Binary { data, .. }) => visitor.visit_borrowed_bytes(data),
            PackValue::Arr(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            _ => Err(self.mismatch("binary")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Null | PackValue::Undefined => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Null | PackValue::Undefined => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Arr(arr) => visitor.visit_seq(SeqDeserializer::new(arr.iter())),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Obj(obj) => visitor.visit_map(MapDeserializer::new(obj.iter())),
            _ => Err(self.mismatch("object")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.input {
            PackValue::Str(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            PackValue::Obj(obj) if obj.len() == 1 => match obj.iter().next() {
                Some((key, value)) => visitor.visit_enum(EnumDeserializer {
                    variant: key.as_str(),
                    value,
                }),
                None => Err(self.mismatch("enum")),
            },
            _ => Err(self.mismatch("string or single-key object for enum")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct SeqDeserializer<I> {
    iter: I,
}

impl<I> SeqDeserializer<I> {
    fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<'de, I: Iterator<Item = &'de PackValue>> SeqAccess<'de> for SeqDeserializer<I> {
    type Error = PackError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.iter.next() {
            Some(value) => seed.deserialize(Deserializer::from_pack(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        match self.iter.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(upper),
            _ => None,
        }
    }
}

struct MapDeserializer<'de, I> {
    iter: I,
    value: Option<&'de PackValue>,
}

impl<'de, I> MapDeserializer<'de, I> {
    fn new(iter: I) -> Self {
        Self { iter, value: None }
    }
}

impl<'de, I: Iterator<Item = (&'de String, &'de PackValue)>> MapAccess<'de>
    for MapDeserializer<'de, I>
{
    type Error = PackError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(KeyDeserializer { key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let value = self
            .value
            .take()
            .ok_or_else(|| PackError::Deserialization("No value".to_string()))?;
        seed.deserialize(Deserializer::from_pack(value))
    }
}

/// 对象键总是字符串，数值类型的目标从文本解析
struct KeyDeserializer<'de> {
    key: &'de str,
}

impl<'de> KeyDeserializer<'de> {
    fn parse<T: std::str::FromStr>(&self) -> Result<T, PackError> {
        self.key
            .parse()
            .map_err(|_| PackError::Deserialization(format!("Invalid numeric key: {}", self.key)))
    }
}

impl<'de> de::Deserializer<'de> for KeyDeserializer<'de> {
    type Error = PackError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.key)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.parse()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(self.parse()?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(self.parse()?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(self.parse()?)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bool(self.parse()?)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_enum(self.key.into_deserializer())
    }

    serde::forward_to_deserialize_any! {
        i8 i16 i128 u8 u16 u128 f32 f64 char str string bytes byte_buf option
        unit unit_struct seq tuple tuple_struct map struct identifier ignored_any
    }
}

struct EnumDeserializer<'de> {
    variant: &'de str,
    value: &'de PackValue,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = PackError;
    type Variant = VariantDeserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Self::Error> {
        use serde::de::value::BorrowedStrDeserializer;
        let deserializer = BorrowedStrDeserializer::<PackError>::new(self.variant);
        let variant: V::Value = seed.deserialize(deserializer)?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer<'de> {
    value: &'de PackValue,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'de> {
    type Error = PackError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, Self::Error> {
        seed.deserialize(Deserializer::from_pack(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_seq(Deserializer::from_pack(self.value), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_map(Deserializer::from_pack(self.value), visitor)
    }
}
