//! BSON 解码器

use super::encoder::element::*;
use super::values::{BsonObjectId, BsonValue};
use crate::codec::{BinaryJsonDecoder, Depth};
use crate::value::{PackMap, PackValue};
use chrono::TimeZone;
use mikudb_common::{CodecConfig, PackError, PackResult, Reader};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BsonDecoder<'a> {
    reader: Reader<'a>,
    config: CodecConfig,
    depth: Depth,
}

impl<'a> BsonDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, CodecConfig::default())
    }

    pub fn with_config(data: &'a [u8], config: CodecConfig) -> Self {
        Self {
            reader: Reader::new(data),
            config,
            depth: Depth::new(config.max_nesting_depth),
        }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.reader.reset(data);
        self.depth.reset();
    }

    /// 读取一个文档，校验声明长度与实际消费的字节数一致
    pub fn read_document(&mut self) -> PackResult<PackMap> {
        self.depth.enter()?;
        let start = self.reader.position();
        let declared = self.reader.i32_le()?;
        if declared < 5 {
            return Err(PackError::malformed(format!(
                "BSON document length {} at offset {} is too small",
                declared, start
            )));
        }
        let end = start + declared as usize;
        let mut obj = PackMap::new();
        let mut terminated = false;
        while self.reader.position() < end {
            let kind_offset = self.reader.position();
            let kind = self.reader.u8()?;
            if kind == 0 {
                terminated = true;
                break;
            }
            let key = self.reader.cstring()?.to_string();
            self.config.check_container_length(obj.len() + 1)?;
            let value = self.read_element(kind, kind_offset)?;
            obj.insert(key, value);
        }
        let consumed = self.reader.position() - start;
        if !terminated || consumed != declared as usize {
            debug!(
                "BSON length mismatch at offset {}: declared {}, consumed {}",
                start, declared, consumed
            );
            return Err(PackError::malformed("incorrect length"));
        }
        self.depth.leave();
        Ok(obj)
    }

    /// 数组在线上是以 "0","1",… 为键的文档，按下标数值重建
    fn read_array(&mut self) -> PackResult<Vec<PackValue>> {
        let doc = self.read_document()?;
        let mut items = doc
            .into_iter()
            .map(|(key, value)| {
                key.parse::<usize>()
                    .map(|index| (index, value))
                    .map_err(|_| PackError::malformed(format!("invalid BSON array key {:?}", key)))
            })
            .collect::<PackResult<Vec<_>>>()?;
        items.sort_by_key(|(index, _)| *index);
        Ok(items.into_iter().map(|(_, value)| value).collect())
    }

    fn read_string(&mut self) -> PackResult<String> {
        let offset = self.reader.position();
        let len = self.reader.i32_le()?;
        if len < 1 {
            return Err(PackError::malformed(format!(
                "BSON string length {} at offset {} is invalid",
                len, offset
            )));
        }
        let len = len as usize - 1;
        self.config.check_string_length(len)?;
        let s = self.reader.utf8(len)?.to_string();
        if self.reader.u8()? != 0 {
            return Err(PackError::malformed("BSON string is not NUL terminated"));
        }
        Ok(s)
    }

    fn read_object_id(&mut self) -> PackResult<BsonObjectId> {
        let bytes: [u8; 12] = self
            .reader
            .buf(BsonObjectId::LEN)?
            .try_into()
            .map_err(|_| PackError::malformed("short ObjectId"))?;
        Ok(BsonObjectId::from_bytes(bytes))
    }

    fn read_binary(&mut self) -> PackResult<PackValue> {
        let len = self.reader.i32_le()?;
        if len < 0 {
            return Err(PackError::malformed(format!("negative BSON binary length {}", len)));
        }
        let subtype = self.reader.u8()?;
        let mut len = len as usize;
        if subtype == SUBTYPE_BINARY_OLD {
            let inner = self.reader.i32_le()?;
            if inner < 0 || inner as usize + 4 != len {
                return Err(PackError::malformed("invalid BSON old binary length"));
            }
            len = inner as usize;
        }
        self.config.check_string_length(len)?;
        let data = self.reader.buf(len)?.to_vec();
        Ok(if subtype == SUBTYPE_GENERIC {
            PackValue::Bin(data)
        } else {
            PackValue::Bson(BsonValue::Binary { subtype, data })
        })
    }

    /// `kind_offset` 是类型字节的位置，键已经读过
    fn read_element(&mut self, kind: u8, kind_offset: usize) -> PackResult<PackValue> {
        let value = match kind {
            DOUBLE => PackValue::Float(self.reader.f64_le()?),
            STRING => PackValue::Str(self.read_string()?),
            DOCUMENT => PackValue::Obj(self.read_document()?),
            ARRAY => PackValue::Arr(self.read_array()?),
            BINARY => self.read_binary()?,
            UNDEFINED => PackValue::Undefined,
            OBJECT_ID => PackValue::Bson(BsonValue::ObjectId(self.read_object_id()?)),
            BOOLEAN => match self.reader.u8()? {
                0 => PackValue::Bool(false),
                1 => PackValue::Bool(true),
                other => {
                    return Err(PackError::malformed(format!(
                        "invalid BSON boolean byte 0x{:02x}",
                        other
                    )))
                }
            },
            DATE_TIME => {
                let millis = self.reader.i64_le()?;
                let dt = chrono::Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| PackError::malformed(format!("date out of range: {}", millis)))?;
                PackValue::Bson(BsonValue::DateTime(dt))
            }
            NULL => PackValue::Null,
            REGEX => {
                let pattern = self.reader.cstring()?.to_string();
                let flags = self.reader.cstring()?.to_string();
                PackValue::Bson(BsonValue::Regex { pattern, flags })
            }
            DB_POINTER => {
                let name = self.read_string()?;
                let id = self.read_object_id()?;
                PackValue::Bson(BsonValue::DbPointer { name, id })
            }
            JAVASCRIPT => PackValue::Bson(BsonValue::JavascriptCode(self.read_string()?)),
            SYMBOL => PackValue::Bson(BsonValue::Symbol(self.read_string()?)),
            JAVASCRIPT_WITH_SCOPE => {
                let start = self.reader.position();
                let declared = self.reader.i32_le()?;
                let code = self.read_string()?;
                let scope = self.read_document()?;
                if self.reader.position() - start != declared.max(0) as usize {
                    return Err(PackError::malformed("incorrect length"));
                }
                PackValue::Bson(BsonValue::JavascriptCodeWithScope { code, scope })
            }
            INT32 => PackValue::Int(self.reader.i32_le()? as i64),
            TIMESTAMP => {
                let increment = self.reader.u32_le()?;
                let timestamp = self.reader.u32_le()?;
                PackValue::Bson(BsonValue::Timestamp {
                    increment,
                    timestamp,
                })
            }
            INT64 => PackValue::Int(self.reader.i64_le()?),
            DECIMAL128 => {
                let bytes: [u8; 16] = self
                    .reader
                    .buf(16)?
                    .try_into()
                    .map_err(|_| PackError::malformed("short Decimal128"))?;
                PackValue::Bson(BsonValue::Decimal128(bytes))
            }
            MIN_KEY => PackValue::Bson(BsonValue::MinKey),
            MAX_KEY => PackValue::Bson(BsonValue::MaxKey),
            other => {
                return Err(PackError::InvalidTypeMarker {
                    marker: other,
                    offset: kind_offset,
                })
            }
        };
        Ok(value)
    }
}

impl BinaryJsonDecoder for BsonDecoder<'_> {
    fn read_any(&mut self) -> PackResult<PackValue> {
        self.read_document().map(PackValue::Obj)
    }

    fn position(&self) -> usize {
        self.reader.position()
    }
}

/// 解码根文档
pub fn decode(data: &[u8]) -> PackResult<PackValue> {
    BsonDecoder::new(data).read_document().map(PackValue::Obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonEncoder;
    use crate::pack;

    fn roundtrip(value: &PackValue) -> PackValue {
        let bytes = BsonEncoder::new().encode(value).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_roundtrip_plain() {
        let value = pack!({
            "s": "str",
            "i": 42,
            "big": (PackValue::Int(1 << 40)),
            "f": 2.5,
            "b": false,
            "n": null,
            "arr": [1, "two", [3]],
            "doc": { "k": "v" },
            "bin": (PackValue::Bin(vec![1, 2, 3]))
        });
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_roundtrip_specials() {
        let id = BsonObjectId::from_hex("507f1f77bcf86cd799439011").unwrap();
        let dt = chrono::Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let value = pack!({
            "id": (BsonValue::ObjectId(id)),
            "at": (BsonValue::DateTime(dt)),
            "re": (BsonValue::regex("^a", "i")),
            "ptr": (BsonValue::DbPointer { name: "c".to_string(), id }),
            "code": (BsonValue::JavascriptCode("f()".to_string())),
            "sym": (BsonValue::Symbol("s".to_string())),
            "ts": (BsonValue::Timestamp { increment: 7, timestamp: 9 }),
            "dec": (BsonValue::Decimal128([3; 16])),
            "min": (BsonValue::MinKey),
            "max": (BsonValue::MaxKey),
            "uuid": (BsonValue::Binary { subtype: 4, data: vec![9; 16] }),
            "old": (BsonValue::Binary { subtype: 2, data: vec![1, 2] })
        });
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_incorrect_length() {
        let mut bytes = BsonEncoder::new().encode(&pack!({ "a": 1 })).unwrap();
        bytes[0] += 1;
        bytes.push(0);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), PackError::malformed("incorrect length").to_string());
    }

    #[test]
    fn test_truncated() {
        let bytes = BsonEncoder::new().encode(&pack!({ "a": "hello" })).unwrap();
        assert!(decode(&bytes[..bytes.len() - 3]).is_err());
        assert!(decode(&[1, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_array_sorted_by_index() {
        // 数组文档键顺序为 "1","0"
        let bytes = vec![
            0x17, 0, 0, 0, // 总长 23
            ARRAY, b'a', 0, //
            0x0f, 0, 0, 0, // 数组文档长 15
            INT32, b'1', 0, 2, 0, 0, 0, //
            NULL, b'0', 0, //
            0, // 数组结束
            0, // 根结束
        ];
        let value = decode(&bytes).unwrap();
        assert_eq!(value, pack!({ "a": [null, 2] }));
    }

    #[test]
    fn test_unknown_element_type() {
        let bytes = vec![8, 0, 0, 0, 0x42, b'a', 0, 0];
        assert!(matches!(
            decode(&bytes),
            Err(PackError::InvalidTypeMarker { marker: 0x42, offset: 4 })
        ));
        // 嵌套文档中的偏移同样指向类型字节，而不是键的结束符
        let bytes = vec![
            17, 0, 0, 0, 0x03, b'd', 0, //
            9, 0, 0, 0, 0x42, b'k', b'e', 0, 0, //
            0,
        ];
        assert!(matches!(
            decode(&bytes),
            Err(PackError::InvalidTypeMarker { marker: 0x42, offset: 11 })
        ));
    }
}
