//! CBOR 解码器
//!
//! 支持全部主类型、不定长容器与分块字符串、半精度浮点。标签解码为 `Ext`；
//! DAG 模式只保留标签 42，其余标签直接展开为被标记的值。

use super::constants::*;
use crate::codec::{guard_key, key_from_value, BinaryJsonDecoder, Depth};
use crate::value::{Extension, PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Reader};

#[derive(Debug, Clone)]
pub struct CborDecoder<'a> {
    reader: Reader<'a>,
    config: CodecConfig,
    depth: Depth,
    dag: bool,
}

/// 半精度浮点转 f64
pub fn decode_f16(half: u16) -> f64 {
    let exp = (half >> 10) & 0x1f;
    let mant = (half & 0x3ff) as f64;
    let value = match exp {
        0 => mant * 2f64.powi(-24),
        31 if mant == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mant + 1024.0) * 2f64.powi(exp as i32 - 25),
    };
    if half & 0x8000 != 0 {
        -value
    } else {
        value
    }
}

impl<'a> CborDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, CodecConfig::default())
    }

    pub fn with_config(data: &'a [u8], config: CodecConfig) -> Self {
        Self {
            reader: Reader::new(data),
            config,
            depth: Depth::new(config.max_nesting_depth),
            dag: false,
        }
    }

    /// DAG-CBOR 解码器
    pub fn dag(data: &'a [u8]) -> Self {
        Self {
            dag: true,
            ..Self::new(data)
        }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.reader.reset(data);
        self.depth.reset();
    }

    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// 读取参数值，`minor` 为头字节低 5 位
    fn read_arg(&mut self, minor: u8) -> PackResult<u64> {
        match minor {
            0..=23 => Ok(minor as u64),
            MINOR_U8 => Ok(self.reader.u8()? as u64),
            MINOR_U16 => Ok(self.reader.u16()? as u64),
            MINOR_U32 => Ok(self.reader.u32()? as u64),
            MINOR_U64 => self.reader.u64(),
            _ => Err(PackError::malformed(format!(
                "invalid CBOR additional info {} at offset {}",
                minor,
                self.reader.position() - 1
            ))),
        }
    }

    fn read_len(&mut self, minor: u8) -> PackResult<usize> {
        let n = self.read_arg(minor)?;
        usize::try_from(n)
            .map_err(|_| PackError::malformed(format!("CBOR length {} overflows usize", n)))
    }

    /// 当前字节为 break 标记时消费它并返回 true
    fn at_break(&mut self) -> PackResult<bool> {
        if self.reader.peek()? == BREAK {
            self.reader.skip(1)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn read_any(&mut self) -> PackResult<PackValue> {
        let offset = self.reader.position();
        let byte = self.reader.u8()?;
        let major = byte >> 5;
        let minor = byte & 0x1f;
        match major {
            MAJOR_UINT => {
                let n = self.read_arg(minor)?;
                Ok(match i64::try_from(n) {
                    Ok(n) => PackValue::Int(n),
                    Err(_) => PackValue::Float(n as f64),
                })
            }
            MAJOR_NINT => {
                let n = self.read_arg(minor)?;
                Ok(match i64::try_from(n) {
                    Ok(n) => PackValue::Int(-1 - n),
                    Err(_) => PackValue::Float(-1.0 - n as f64),
                })
            }
            MAJOR_BIN => self.read_bin(minor).map(PackValue::Bin),
            MAJOR_STR => self.read_str(minor).map(PackValue::Str),
            MAJOR_ARR => self.read_arr(minor),
            MAJOR_MAP => self.read_obj(minor),
            MAJOR_TAG => {
                let tag = self.read_arg(minor)?;
                self.depth.enter()?;
                let value = self.read_any()?;
                self.depth.leave();
                if self.dag && tag != TAG_CID {
                    Ok(value)
                } else {
                    Ok(PackValue::Ext(Extension::new(tag, value)))
                }
            }
            _ => match byte {
                FALSE => Ok(PackValue::Bool(false)),
                TRUE => Ok(PackValue::Bool(true)),
                NULL => Ok(PackValue::Null),
                UNDEFINED => Ok(PackValue::Undefined),
                FLOAT16 => Ok(PackValue::Float(decode_f16(self.reader.u16()?))),
                FLOAT32 => Ok(PackValue::Float(self.reader.f32()? as f64)),
                FLOAT64 => Ok(PackValue::Float(self.reader.f64()?)),
                _ => Err(PackError::InvalidTypeMarker {
                    marker: byte,
                    offset,
                }),
            },
        }
    }

    fn read_bin(&mut self, minor: u8) -> PackResult<Vec<u8>> {
        if minor == MINOR_INDEFINITE {
            let mut out = Vec::new();
            while !self.at_break()? {
                let byte = self.reader.u8()?;
                if byte >> 5 != MAJOR_BIN || byte & 0x1f == MINOR_INDEFINITE {
                    return Err(PackError::malformed("invalid chunk in indefinite byte string"));
                }
                let len = self.read_len(byte & 0x1f)?;
                self.config.check_string_length(out.len().saturating_add(len))?;
                out.extend_from_slice(self.reader.buf(len)?);
            }
            return Ok(out);
        }
        let len = self.read_len(minor)?;
        self.config.check_string_length(len)?;
        Ok(self.reader.buf(len)?.to_vec())
    }

    fn read_str(&mut self, minor: u8) -> PackResult<String> {
        if minor == MINOR_INDEFINITE {
            let mut out = String::new();
            while !self.at_break()? {
                let byte = self.reader.u8()?;
                if byte >> 5 != MAJOR_STR || byte & 0x1f == MINOR_INDEFINITE {
                    return Err(PackError::malformed("invalid chunk in indefinite text string"));
                }
                let len = self.read_len(byte & 0x1f)?;
                self.config.check_string_length(out.len().saturating_add(len))?;
                out.push_str(self.reader.utf8(len)?);
            }
            return Ok(out);
        }
        let len = self.read_len(minor)?;
        self.config.check_string_length(len)?;
        Ok(self.reader.utf8(len)?.to_string())
    }

    fn read_arr(&mut self, minor: u8) -> PackResult<PackValue> {
        self.depth.enter()?;
        let arr = if minor == MINOR_INDEFINITE {
            let mut arr = Vec::new();
            while !self.at_break()? {
                self.config.check_container_length(arr.len() + 1)?;
                arr.push(self.read_any()?);
            }
            arr
        } else {
            let len = self.read_len(minor)?;
            self.config.check_container_length(len)?;
            let mut arr = Vec::with_capacity(len.min(self.reader.remaining()));
            for _ in 0..len {
                arr.push(self.read_any()?);
            }
            arr
        };
        self.depth.leave();
        Ok(PackValue::Arr(arr))
    }

    fn read_obj(&mut self, minor: u8) -> PackResult<PackValue> {
        self.depth.enter()?;
        let mut obj = PackMap::new();
        if minor == MINOR_INDEFINITE {
            while !self.at_break()? {
                self.config.check_container_length(obj.len() + 1)?;
                self.read_entry(&mut obj)?;
            }
        } else {
            let len = self.read_len(minor)?;
            self.config.check_container_length(len)?;
            obj.reserve(len.min(self.reader.remaining()));
            for _ in 0..len {
                self.read_entry(&mut obj)?;
            }
        }
        self.depth.leave();
        Ok(PackValue::Obj(obj))
    }

    fn read_entry(&mut self, obj: &mut PackMap) -> PackResult<()> {
        let key = key_from_value(self.read_any()?)?;
        guard_key(&key)?;
        let value = self.read_any()?;
        obj.insert(key, value);
        Ok(())
    }

    /// 跳过一个完整的值，返回跳过的字节数
    pub fn skip_any(&mut self) -> PackResult<usize> {
        let start = self.reader.position();
        let byte = self.reader.u8()?;
        let major = byte >> 5;
        let minor = byte & 0x1f;
        match major {
            MAJOR_UINT | MAJOR_NINT => {
                self.read_arg(minor)?;
            }
            MAJOR_BIN | MAJOR_STR => {
                if minor == MINOR_INDEFINITE {
                    while !self.at_break()? {
                        self.skip_any()?;
                    }
                } else {
                    let len = self.read_len(minor)?;
                    self.reader.skip(len)?;
                }
            }
            MAJOR_ARR | MAJOR_MAP => {
                let per_entry = if major == MAJOR_MAP { 2 } else { 1 };
                self.depth.enter()?;
                if minor == MINOR_INDEFINITE {
                    while !self.at_break()? {
                        for _ in 0..per_entry {
                            self.skip_any()?;
                        }
                    }
                } else {
                    let len = self.read_len(minor)?;
                    for _ in 0..len {
                        for _ in 0..per_entry {
                            self.skip_any()?;
                        }
                    }
                }
                self.depth.leave();
            }
            MAJOR_TAG => {
                self.read_arg(minor)?;
                self.depth.enter()?;
                self.skip_any()?;
                self.depth.leave();
            }
            _ => match minor {
                0..=23 => {}
                MINOR_U8 => self.reader.skip(1)?,
                MINOR_U16 => self.reader.skip(2)?,
                MINOR_U32 => self.reader.skip(4)?,
                MINOR_U64 => self.reader.skip(8)?,
                _ => {
                    return Err(PackError::InvalidTypeMarker {
                        marker: byte,
                        offset: start,
                    })
                }
            },
        }
        Ok(self.reader.position() - start)
    }
}

impl BinaryJsonDecoder for CborDecoder<'_> {
    fn read_any(&mut self) -> PackResult<PackValue> {
        CborDecoder::read_any(self)
    }

    fn position(&self) -> usize {
        self.reader.position()
    }
}

pub fn decode(data: &[u8]) -> PackResult<PackValue> {
    CborDecoder::new(data).read_any()
}

/// 按 DAG-CBOR 规则解码
pub fn decode_dag(data: &[u8]) -> PackResult<PackValue> {
    CborDecoder::dag(data).read_any()
}

/// 校验输入恰好包含一个完整的值
pub fn validate(data: &[u8]) -> PackResult<()> {
    let size = CborDecoder::new(data).skip_any()?;
    if size != data.len() {
        return Err(PackError::malformed(format!(
            "trailing bytes: value ends at {}, input has {}",
            size,
            data.len()
        )));
    }
    Ok(())
}
