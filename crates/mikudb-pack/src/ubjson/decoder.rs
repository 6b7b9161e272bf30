//! UBJSON 解码器
//!
//! 容器默认以结束标记收尾；带 `#count` 时按个数读取，带 `$type` 时元素省略类型标记。
//! `[$U#` 形式的容器解码为二进制。

use super::constants::*;
use crate::codec::{guard_key, BinaryJsonDecoder, Depth};
use crate::value::{PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Reader};

#[derive(Debug, Clone)]
pub struct UbjsonDecoder<'a> {
    reader: Reader<'a>,
    config: CodecConfig,
    depth: Depth,
}

/// 优化容器头：元素类型与元素个数
#[derive(Debug, Clone, Copy, Default)]
struct ContainerHeader {
    kind: Option<u8>,
    count: Option<usize>,
}

impl<'a> UbjsonDecoder<'a> {
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

    pub fn read_any(&mut self) -> PackResult<PackValue> {
        let mut tag = self.reader.u8()?;
        while tag == NOOP {
            tag = self.reader.u8()?;
        }
        self.read_tagged(tag)
    }

    fn read_tagged(&mut self, tag: u8) -> PackResult<PackValue> {
        let r = &mut self.reader;
        let value = match tag {
            NULL => PackValue::Null,
            TRUE => PackValue::Bool(true),
            FALSE => PackValue::Bool(false),
            UINT8 => PackValue::Int(r.u8()? as i64),
            INT8 => PackValue::Int(r.i8()? as i64),
            INT16 => PackValue::Int(r.i16()? as i64),
            INT32 => PackValue::Int(r.i32()? as i64),
            INT64 => PackValue::Int(r.i64()?),
            FLOAT32 => PackValue::Float(r.f32()? as f64),
            FLOAT64 => PackValue::Float(r.f64()?),
            CHAR => {
                let c = r.u8()?;
                if !c.is_ascii() {
                    return Err(PackError::malformed(format!("invalid UBJSON char 0x{:02x}", c)));
                }
                PackValue::Str((c as char).to_string())
            }
            STRING => PackValue::Str(self.read_key()?),
            HIGH_PRECISION => self.read_high_precision()?,
            ARRAY_START => self.read_arr()?,
            OBJECT_START => self.read_obj()?,
            _ => {
                return Err(PackError::InvalidTypeMarker {
                    marker: tag,
                    offset: self.reader.position() - 1,
                })
            }
        };
        Ok(value)
    }

    /// 读取非负整数长度，长度本身是一个带类型标记的整数
    fn read_length(&mut self) -> PackResult<usize> {
        let offset = self.reader.position();
        let tag = self.reader.u8()?;
        let n = match tag {
            UINT8 => self.reader.u8()? as i64,
            INT8 => self.reader.i8()? as i64,
            INT16 => self.reader.i16()? as i64,
            INT32 => self.reader.i32()? as i64,
            INT64 => self.reader.i64()?,
            _ => {
                return Err(PackError::InvalidTypeMarker {
                    marker: tag,
                    offset,
                })
            }
        };
        usize::try_from(n)
            .map_err(|_| PackError::malformed(format!("negative UBJSON length {} at offset {}", n, offset)))
    }

    /// 对象键与 `S` 字符串的载荷：长度前缀加 UTF-8 字节
    fn read_key(&mut self) -> PackResult<String> {
        let len = self.read_length()?;
        self.config.check_string_length(len)?;
        Ok(self.reader.utf8(len)?.to_string())
    }

    fn read_high_precision(&mut self) -> PackResult<PackValue> {
        let text = self.read_key()?;
        if let Ok(n) = text.parse::<i64>() {
            return Ok(PackValue::Int(n));
        }
        text.parse::<f64>()
            .map(PackValue::Float)
            .map_err(|_| PackError::malformed(format!("invalid high-precision number {:?}", text)))
    }

    fn read_container_header(&mut self) -> PackResult<ContainerHeader> {
        let mut header = ContainerHeader::default();
        if self.reader.peek()? == CONTAINER_TYPE {
            self.reader.skip(1)?;
            header.kind = Some(self.reader.u8()?);
            if self.reader.peek()? != CONTAINER_COUNT {
                return Err(PackError::malformed("UBJSON typed container requires a count"));
            }
        }
        if self.reader.peek()? == CONTAINER_COUNT {
            self.reader.skip(1)?;
            let count = self.read_length()?;
            self.config.check_container_length(count)?;
            header.count = Some(count);
        }
        Ok(header)
    }

    fn read_element(&mut self, kind: Option<u8>) -> PackResult<PackValue> {
        match kind {
            Some(tag) => self.read_tagged(tag),
            None => self.read_any(),
        }
    }

    fn skip_noops(&mut self) -> PackResult<u8> {
        let mut byte = self.reader.peek()?;
        while byte == NOOP {
            self.reader.skip(1)?;
            byte = self.reader.peek()?;
        }
        Ok(byte)
    }

    fn read_arr(&mut self) -> PackResult<PackValue> {
        let header = self.read_container_header()?;
        if let (Some(UINT8), Some(count)) = (header.kind, header.count) {
            self.config.check_string_length(count)?;
            return Ok(PackValue::Bin(self.reader.buf(count)?.to_vec()));
        }
        self.depth.enter()?;
        let mut arr = Vec::new();
        match header.count {
            Some(count) => {
                arr.reserve(count.min(self.reader.remaining()));
                for _ in 0..count {
                    arr.push(self.read_element(header.kind)?);
                }
            }
            None => loop {
                if self.skip_noops()? == ARRAY_END {
                    self.reader.skip(1)?;
                    break;
                }
                self.config.check_container_length(arr.len() + 1)?;
                arr.push(self.read_any()?);
            },
        }
        self.depth.leave();
        Ok(PackValue::Arr(arr))
    }

    fn read_obj(&mut self) -> PackResult<PackValue> {
        let header = self.read_container_header()?;
        self.depth.enter()?;
        let mut obj = PackMap::new();
        match header.count {
            Some(count) => {
                for _ in 0..count {
                    let key = self.read_key()?;
                    guard_key(&key)?;
                    let value = self.read_element(header.kind)?;
                    obj.insert(key, value);
                }
            }
            None => loop {
                if self.skip_noops()? == OBJECT_END {
                    self.reader.skip(1)?;
                    break;
                }
                self.config.check_container_length(obj.len() + 1)?;
                let key = self.read_key()?;
                guard_key(&key)?;
                let value = self.read_any()?;
                obj.insert(key, value);
            },
        }
        self.depth.leave();
        Ok(PackValue::Obj(obj))
    }
}

impl BinaryJsonDecoder for UbjsonDecoder<'_> {
    fn read_any(&mut self) -> PackResult<PackValue> {
        UbjsonDecoder::read_any(self)
    }

    fn position(&self) -> usize {
        self.reader.position()
    }
}

pub fn decode(data: &[u8]) -> PackResult<PackValue> {
    UbjsonDecoder::new(data).read_any()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryJsonEncoder;
    use crate::pack;
    use crate::ubjson::UbjsonEncoder;

    #[test]
    fn test_roundtrip() {
        let value = pack!({
            "a": [1, 300, (-5), 70000, (PackValue::Int(1 << 40))],
            "s": "héllo",
            "f": 1.25,
            "n": null,
            "b": [true, false],
            "bin": (PackValue::Bin(vec![0, 255]))
        });
        let bytes = UbjsonEncoder::new().encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_counted_and_typed() {
        // [#U2 i1 i2]
        let bytes = [b'[', b'#', b'U', 2, b'i', 1, b'i', 2];
        assert_eq!(decode(&bytes).unwrap(), pack!([1, 2]));
        // [$i#U2 1 2]
        let bytes = [b'[', b'$', b'i', b'#', b'U', 2, 1, 2];
        assert_eq!(decode(&bytes).unwrap(), pack!([1, 2]));
        // {$T#U1 a}
        let bytes = [b'{', b'$', b'T', b'#', b'U', 1, b'U', 1, b'a'];
        assert_eq!(decode(&bytes).unwrap(), pack!({ "a": true }));
    }

    #[test]
    fn test_noop_and_char() {
        let bytes = [b'N', b'[', b'N', b'C', b'x', b'N', b']'];
        assert_eq!(decode(&bytes).unwrap(), pack!(["x"]));
    }

    #[test]
    fn test_high_precision() {
        let bytes = [b'H', b'U', 3, b'1', b'.', b'5'];
        assert_eq!(decode(&bytes).unwrap(), pack!(1.5));
        let bytes = [b'H', b'U', 2, b'x', b'y'];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_type_without_count() {
        let bytes = [b'[', b'$', b'i', 1, 2, b']'];
        assert!(matches!(decode(&bytes), Err(PackError::MalformedInput(_))));
    }

    #[test]
    fn test_rejects_proto_key() {
        let mut bytes = vec![b'{', b'U', 9];
        bytes.extend_from_slice(b"__proto__");
        bytes.extend_from_slice(&[b'Z', b'}']);
        assert!(matches!(decode(&bytes), Err(PackError::SecurityRejection(_))));
    }

    #[test]
    fn test_unknown_marker() {
        assert!(matches!(
            decode(&[b'?']),
            Err(PackError::InvalidTypeMarker { marker: b'?', offset: 0 })
        ));
    }
}
