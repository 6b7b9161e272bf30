//! BSON 专属值类型
//!
//! 每个 BSON 特殊类型对应 `BsonValue` 的一个变体，编码器按变体穷举分派。

use crate::value::PackMap;
use chrono::{DateTime, Utc};
use mikudb_common::{PackError, PackResult};
use std::fmt;

/// BSON ObjectId
///
/// 12 字节：4 字节秒级时间戳、5 字节进程随机值、3 字节计数器，均为大端序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BsonObjectId {
    pub timestamp: u32,
    /// 低 40 位有效
    pub process: u64,
    /// 低 24 位有效
    pub counter: u32,
}

impl BsonObjectId {
    pub const LEN: usize = 12;

    pub fn new(timestamp: u32, process: u64, counter: u32) -> Self {
        Self {
            timestamp,
            process: process & 0xff_ffff_ffff,
            counter: counter & 0xff_ffff,
        }
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        let timestamp = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let process = bytes[4..9]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);
        let counter = bytes[9..12]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        Self {
            timestamp,
            process,
            counter,
        }
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&self.timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process.to_be_bytes()[3..8]);
        bytes[9..12].copy_from_slice(&self.counter.to_be_bytes()[1..4]);
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> PackResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| PackError::malformed(format!("Invalid ObjectId hex: {}", e)))?;
        let bytes: [u8; 12] = bytes
            .try_into()
            .map_err(|_| PackError::malformed("ObjectId must be 12 bytes"))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for BsonObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    ObjectId(BsonObjectId),
    DateTime(DateTime<Utc>),
    Regex { pattern: String, flags: String },
    DbPointer { name: String, id: BsonObjectId },
    JavascriptCode(String),
    Symbol(String),
    JavascriptCodeWithScope { code: String, scope: PackMap },
    Int32(i32),
    Int64(i64),
    Float(f64),
    Timestamp { increment: u32, timestamp: u32 },
    Decimal128([u8; 16]),
    MinKey,
    MaxKey,
    Binary { subtype: u8, data: Vec<u8> },
}

impl BsonValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            BsonValue::ObjectId(_) => "objectId",
            BsonValue::DateTime(_) => "date",
            BsonValue::Regex { .. } => "regex",
            BsonValue::DbPointer { .. } => "dbPointer",
            BsonValue::JavascriptCode(_) => "javascript",
            BsonValue::Symbol(_) => "symbol",
            BsonValue::JavascriptCodeWithScope { .. } => "javascriptWithScope",
            BsonValue::Int32(_) => "int",
            BsonValue::Int64(_) => "long",
            BsonValue::Float(_) => "double",
            BsonValue::Timestamp { .. } => "timestamp",
            BsonValue::Decimal128(_) => "decimal",
            BsonValue::MinKey => "minKey",
            BsonValue::MaxKey => "maxKey",
            BsonValue::Binary { .. } => "binData",
        }
    }

    /// 构造正则值，选项字符按字母序排列
    pub fn regex(pattern: impl Into<String>, flags: &str) -> Self {
        BsonValue::Regex {
            pattern: pattern.into(),
            flags: sorted_flags(flags),
        }
    }
}

pub(crate) fn sorted_flags(flags: &str) -> String {
    let mut chars: Vec<char> = flags.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

impl fmt::Display for BsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BsonValue::ObjectId(id) => write!(f, "ObjectId(\"{}\")", id),
            BsonValue::DateTime(dt) => write!(f, "ISODate(\"{}\")", dt.to_rfc3339()),
            BsonValue::Regex { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
            BsonValue::DbPointer { name, id } => write!(f, "DBPointer(\"{}\", {})", name, id),
            BsonValue::JavascriptCode(code) => write!(f, "Code({:?})", code),
            BsonValue::Symbol(s) => write!(f, "Symbol({:?})", s),
            BsonValue::JavascriptCodeWithScope { code, scope } => {
                write!(f, "Code({:?}, <scope:{} keys>)", code, scope.len())
            }
            BsonValue::Int32(n) => write!(f, "NumberInt({})", n),
            BsonValue::Int64(n) => write!(f, "NumberLong({})", n),
            BsonValue::Float(n) => write!(f, "{}", n),
            BsonValue::Timestamp {
                increment,
                timestamp,
            } => write!(f, "Timestamp({}, {})", timestamp, increment),
            BsonValue::Decimal128(bytes) => write!(f, "NumberDecimal(0x{})", hex::encode(bytes)),
            BsonValue::MinKey => write!(f, "MinKey"),
            BsonValue::MaxKey => write!(f, "MaxKey"),
            BsonValue::Binary { subtype, data } => {
                write!(f, "BinData({}, <{} bytes>)", subtype, data.len())
            }
        }
    }
}
