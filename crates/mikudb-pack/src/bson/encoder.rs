//! BSON 编码器
//!
//! 文档长度采用回填：先预留 4 字节，写完元素和结尾的 0 后，
//! 用 `end - start` 覆盖预留位置。

use super::values::{sorted_flags, BsonObjectId, BsonValue};
use crate::codec::Depth;
use crate::value::{PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Writer};
use tracing::trace;

pub mod element {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const DATE_TIME: u8 = 0x09;
    pub const NULL: u8 = 0x0a;
    pub const REGEX: u8 = 0x0b;
    pub const DB_POINTER: u8 = 0x0c;
    pub const JAVASCRIPT: u8 = 0x0d;
    pub const SYMBOL: u8 = 0x0e;
    pub const JAVASCRIPT_WITH_SCOPE: u8 = 0x0f;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
    pub const DECIMAL128: u8 = 0x13;
    pub const MIN_KEY: u8 = 0xff;
    pub const MAX_KEY: u8 = 0x7f;

    pub const SUBTYPE_GENERIC: u8 = 0x00;
    pub const SUBTYPE_BINARY_OLD: u8 = 0x02;
}

use element::*;

#[derive(Debug, Clone)]
pub struct BsonEncoder {
    writer: Writer,
    depth: Depth,
}

impl Default for BsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BsonEncoder {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            depth: Depth::new(config.max_nesting_depth),
        }
    }

    pub fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    /// 编码根值，根值必须是对象
    pub fn encode(&mut self, value: &PackValue) -> PackResult<Vec<u8>> {
        self.writer.reset();
        self.write_any(value)?;
        Ok(self.writer.flush())
    }

    /// 在当前位置写入根文档，不清空写入器
    pub fn write_any(&mut self, value: &PackValue) -> PackResult<()> {
        self.depth.reset();
        match value {
            PackValue::Obj(obj) => self.write_document(obj),
            other => Err(PackError::unsupported(format!(
                "BSON root must be an object, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn write_document(&mut self, obj: &PackMap) -> PackResult<()> {
        self.write_doc_entries(obj.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn write_array_document(&mut self, arr: &[PackValue]) -> PackResult<()> {
        let keys: Vec<String> = (0..arr.len()).map(|i| i.to_string()).collect();
        self.write_doc_entries(keys.iter().map(String::as_str).zip(arr.iter()))
    }

    fn write_doc_entries<'v, I>(&mut self, entries: I) -> PackResult<()>
    where
        I: Iterator<Item = (&'v str, &'v PackValue)>,
    {
        self.depth.enter()?;
        let start = self.writer.reserve_slot(4);
        for (key, value) in entries {
            self.write_element(key, value)?;
        }
        self.writer.u8(0);
        self.patch_length(start)?;
        self.depth.leave();
        Ok(())
    }

    /// 用 `end - start` 回填 `start` 处预留的长度
    fn patch_length(&mut self, start: usize) -> PackResult<()> {
        let len = self.writer.position() - start;
        let len = i32::try_from(len).map_err(|_| PackError::LimitExceeded {
            what: "BSON document",
            len,
            max: i32::MAX as usize,
        })?;
        self.writer.patch_i32_le(start, len);
        trace!("BSON length patched: {} bytes at offset {}", len, start);
        Ok(())
    }

    fn write_cstring(&mut self, s: &str) -> PackResult<()> {
        if s.contains('\0') {
            return Err(PackError::unsupported(format!(
                "BSON cstring cannot contain NUL: {:?}",
                s
            )));
        }
        self.writer.utf8(s);
        self.writer.u8(0);
        Ok(())
    }

    fn write_string(&mut self, s: &str) {
        self.writer.i32_le(s.len() as i32 + 1);
        self.writer.utf8(s);
        self.writer.u8(0);
    }

    fn write_head(&mut self, kind: u8, key: &str) -> PackResult<()> {
        self.writer.u8(kind);
        self.write_cstring(key)
    }

    fn write_object_id(&mut self, id: &BsonObjectId) {
        self.writer.buf(&id.to_bytes());
    }

    fn write_binary(&mut self, subtype: u8, data: &[u8]) {
        if subtype == SUBTYPE_BINARY_OLD {
            self.writer.i32_le(data.len() as i32 + 4);
            self.writer.u8(subtype);
            self.writer.i32_le(data.len() as i32);
        } else {
            self.writer.i32_le(data.len() as i32);
            self.writer.u8(subtype);
        }
        self.writer.buf(data);
    }

    fn write_element(&mut self, key: &str, value: &PackValue) -> PackResult<()> {
        match value {
            PackValue::Null => self.write_head(NULL, key)?,
            PackValue::Undefined => self.write_head(UNDEFINED, key)?,
            PackValue::Bool(b) => {
                self.write_head(BOOLEAN, key)?;
                self.writer.u8(*b as u8);
            }
            PackValue::Int(n) => match i32::try_from(*n) {
                Ok(n) => {
                    self.write_head(INT32, key)?;
                    self.writer.i32_le(n);
                }
                Err(_) => {
                    self.write_head(INT64, key)?;
                    self.writer.i64_le(*n);
                }
            },
            PackValue::Float(f) => {
                self.write_head(DOUBLE, key)?;
                self.writer.f64_le(*f);
            }
            PackValue::Str(s) => {
                self.write_head(STRING, key)?;
                self.write_string(s);
            }
            PackValue::Bin(data) => {
                self.write_head(BINARY, key)?;
                self.write_binary(SUBTYPE_GENERIC, data);
            }
            PackValue::Arr(arr) => {
                self.write_head(ARRAY, key)?;
                self.write_array_document(arr)?;
            }
            PackValue::Obj(obj) => {
                self.write_head(DOCUMENT, key)?;
                self.write_document(obj)?;
            }
            PackValue::Bson(special) => self.write_special(key, special)?,
            PackValue::Ext(_) | PackValue::Raw(_) => {
                return Err(PackError::unsupported(format!(
                    "BSON cannot encode {} at key {:?}",
                    value.type_name(),
                    key
                )))
            }
        }
        Ok(())
    }

    fn write_special(&mut self, key: &str, value: &BsonValue) -> PackResult<()> {
        match value {
            BsonValue::ObjectId(id) => {
                self.write_head(OBJECT_ID, key)?;
                self.write_object_id(id);
            }
            BsonValue::DateTime(dt) => {
                self.write_head(DATE_TIME, key)?;
                self.writer.i64_le(dt.timestamp_millis());
            }
            BsonValue::Regex { pattern, flags } => {
                self.write_head(REGEX, key)?;
                self.write_cstring(pattern)?;
                self.write_cstring(&sorted_flags(flags))?;
            }
            BsonValue::DbPointer { name, id } => {
                self.write_head(DB_POINTER, key)?;
                self.write_string(name);
                self.write_object_id(id);
            }
            BsonValue::JavascriptCode(code) => {
                self.write_head(JAVASCRIPT, key)?;
                self.write_string(code);
            }
            BsonValue::Symbol(symbol) => {
                self.write_head(SYMBOL, key)?;
                self.write_string(symbol);
            }
            BsonValue::JavascriptCodeWithScope { code, scope } => {
                self.write_head(JAVASCRIPT_WITH_SCOPE, key)?;
                let start = self.writer.reserve_slot(4);
                self.write_string(code);
                self.write_document(scope)?;
                self.patch_length(start)?;
            }
            BsonValue::Int32(n) => {
                self.write_head(INT32, key)?;
                self.writer.i32_le(*n);
            }
            BsonValue::Int64(n) => {
                self.write_head(INT64, key)?;
                self.writer.i64_le(*n);
            }
            BsonValue::Float(f) => {
                self.write_head(DOUBLE, key)?;
                self.writer.f64_le(*f);
            }
            BsonValue::Timestamp {
                increment,
                timestamp,
            } => {
                self.write_head(TIMESTAMP, key)?;
                self.writer.u32_le(*increment);
                self.writer.u32_le(*timestamp);
            }
            BsonValue::Decimal128(bytes) => {
                self.write_head(DECIMAL128, key)?;
                self.writer.buf(bytes);
            }
            BsonValue::MinKey => self.write_head(MIN_KEY, key)?,
            BsonValue::MaxKey => self.write_head(MAX_KEY, key)?,
            BsonValue::Binary { subtype, data } => {
                self.write_head(BINARY, key)?;
                self.write_binary(*subtype, data);
            }
        }
        Ok(())
    }
}
