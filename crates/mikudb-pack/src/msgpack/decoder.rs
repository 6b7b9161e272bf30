//! MessagePack 解码器
//!
//! 只根据前导字节分派。除完整解码外，还提供跳过（`skip_any`）和单层解码
//! （`read_level`）两个基础操作，导航器在其上实现按路径定位。

use super::constants::*;
use crate::codec::{guard_key, key_from_value, BinaryJsonDecoder, Depth};
use crate::value::{Extension, PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Reader};

#[derive(Debug, Clone)]
pub struct MsgPackDecoder<'a> {
    reader: Reader<'a>,
    config: CodecConfig,
    depth: Depth,
}

impl<'a> MsgPackDecoder<'a> {
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

    pub fn reader(&self) -> &Reader<'a> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub fn read_any(&mut self) -> PackResult<PackValue> {
        let byte = self.reader.u8()?;
        let r = &mut self.reader;
        let value = match byte {
            0x00..=POSITIVE_FIXINT_MAX => PackValue::Int(byte as i64),
            0x80..=0x8f => return self.read_obj((byte & 0x0f) as usize),
            0x90..=0x9f => return self.read_arr((byte & 0x0f) as usize),
            0xa0..=0xbf => return self.read_str((byte & 0x1f) as usize),
            NIL => PackValue::Null,
            UNDEFINED => PackValue::Undefined,
            FALSE => PackValue::Bool(false),
            TRUE => PackValue::Bool(true),
            BIN8 => {
                let len = r.u8()? as usize;
                return self.read_bin(len);
            }
            BIN16 => {
                let len = r.u16()? as usize;
                return self.read_bin(len);
            }
            BIN32 => {
                let len = r.u32()? as usize;
                return self.read_bin(len);
            }
            EXT8 => {
                let len = r.u8()? as usize;
                return self.read_ext(len);
            }
            EXT16 => {
                let len = r.u16()? as usize;
                return self.read_ext(len);
            }
            EXT32 => {
                let len = r.u32()? as usize;
                return self.read_ext(len);
            }
            FLOAT32 => PackValue::Float(r.f32()? as f64),
            FLOAT64 => PackValue::Float(r.f64()?),
            UINT8 => PackValue::Int(r.u8()? as i64),
            UINT16 => PackValue::Int(r.u16()? as i64),
            UINT32 => PackValue::Int(r.u32()? as i64),
            UINT64 => {
                let n = r.u64()?;
                match i64::try_from(n) {
                    Ok(n) => PackValue::Int(n),
                    Err(_) => PackValue::Float(n as f64),
                }
            }
            INT8 => PackValue::Int(r.i8()? as i64),
            INT16 => PackValue::Int(r.i16()? as i64),
            INT32 => PackValue::Int(r.i32()? as i64),
            INT64 => PackValue::Int(r.i64()?),
            FIXEXT1 => return self.read_ext(1),
            FIXEXT2 => return self.read_ext(2),
            FIXEXT4 => return self.read_ext(4),
            FIXEXT8 => return self.read_ext(8),
            FIXEXT16 => return self.read_ext(16),
            STR8 => {
                let len = r.u8()? as usize;
                return self.read_str(len);
            }
            STR16 => {
                let len = r.u16()? as usize;
                return self.read_str(len);
            }
            STR32 => {
                let len = r.u32()? as usize;
                return self.read_str(len);
            }
            ARRAY16 => {
                let len = r.u16()? as usize;
                return self.read_arr(len);
            }
            ARRAY32 => {
                let len = r.u32()? as usize;
                return self.read_arr(len);
            }
            MAP16 => {
                let len = r.u16()? as usize;
                return self.read_obj(len);
            }
            MAP32 => {
                let len = r.u32()? as usize;
                return self.read_obj(len);
            }
            NEGATIVE_FIXINT..=0xff => PackValue::Int(byte as i8 as i64),
        };
        Ok(value)
    }

    fn read_str(&mut self, len: usize) -> PackResult<PackValue> {
        self.config.check_string_length(len)?;
        Ok(PackValue::Str(self.reader.utf8(len)?.to_string()))
    }

    fn read_bin(&mut self, len: usize) -> PackResult<PackValue> {
        self.config.check_string_length(len)?;
        Ok(PackValue::Bin(self.reader.buf(len)?.to_vec()))
    }

    fn read_ext(&mut self, len: usize) -> PackResult<PackValue> {
        self.config.check_string_length(len)?;
        let tag = self.reader.u8()?;
        let data = self.reader.buf(len)?.to_vec();
        Ok(PackValue::Ext(Extension::new(tag as u64, PackValue::Bin(data))))
    }

    fn read_arr(&mut self, len: usize) -> PackResult<PackValue> {
        self.config.check_container_length(len)?;
        self.depth.enter()?;
        let mut arr = Vec::with_capacity(len.min(self.reader.remaining()));
        for _ in 0..len {
            arr.push(self.read_any()?);
        }
        self.depth.leave();
        Ok(PackValue::Arr(arr))
    }

    fn read_obj(&mut self, len: usize) -> PackResult<PackValue> {
        self.config.check_container_length(len)?;
        self.depth.enter()?;
        let mut obj = PackMap::with_capacity(len.min(self.reader.remaining()));
        for _ in 0..len {
            let key = self.read_key()?;
            guard_key(&key)?;
            let value = self.read_any()?;
            obj.insert(key, value);
        }
        self.depth.leave();
        Ok(PackValue::Obj(obj))
    }

    /// 读取对象键，非字符串键转为文本
    pub fn read_key(&mut self) -> PackResult<String> {
        if is_str(self.reader.peek()?) {
            let len = self.read_str_header()?;
            self.config.check_string_length(len)?;
            return Ok(self.reader.utf8(len)?.to_string());
        }
        key_from_value(self.read_any()?)
    }

    /// 读取 map 头部，返回键值对个数
    ///
    /// 游标不在 map 上时返回 `MalformedInput`，游标保持不动。
    pub fn read_obj_header(&mut self) -> PackResult<usize> {
        let start = self.reader.position();
        let byte = self.reader.u8()?;
        let len = match byte {
            0x80..=0x8f => (byte & 0x0f) as usize,
            MAP16 => self.reader.u16()? as usize,
            MAP32 => self.reader.u32()? as usize,
            _ => {
                self.reader.set_position(start);
                return Err(PackError::malformed(format!(
                    "expected map at offset {}, found 0x{:02x}",
                    start, byte
                )));
            }
        };
        Ok(len)
    }

    /// 读取 array 头部，返回元素个数
    pub fn read_arr_header(&mut self) -> PackResult<usize> {
        let start = self.reader.position();
        let byte = self.reader.u8()?;
        let len = match byte {
            0x90..=0x9f => (byte & 0x0f) as usize,
            ARRAY16 => self.reader.u16()? as usize,
            ARRAY32 => self.reader.u32()? as usize,
            _ => {
                self.reader.set_position(start);
                return Err(PackError::malformed(format!(
                    "expected array at offset {}, found 0x{:02x}",
                    start, byte
                )));
            }
        };
        Ok(len)
    }

    /// 读取字符串头部，返回字节长度
    pub fn read_str_header(&mut self) -> PackResult<usize> {
        let start = self.reader.position();
        let byte = self.reader.u8()?;
        let len = match byte {
            0xa0..=0xbf => (byte & 0x1f) as usize,
            STR8 => self.reader.u8()? as usize,
            STR16 => self.reader.u16()? as usize,
            STR32 => self.reader.u32()? as usize,
            _ => {
                self.reader.set_position(start);
                return Err(PackError::malformed(format!(
                    "expected string at offset {}, found 0x{:02x}",
                    start, byte
                )));
            }
        };
        Ok(len)
    }

    /// 跳过一个完整的值，返回跳过的字节数
    pub fn skip_any(&mut self) -> PackResult<usize> {
        let start = self.reader.position();
        let byte = self.reader.u8()?;
        let r = &mut self.reader;
        match byte {
            0x00..=POSITIVE_FIXINT_MAX | NIL..=TRUE | NEGATIVE_FIXINT..=0xff => {}
            0x80..=0x8f => self.skip_obj((byte & 0x0f) as usize)?,
            0x90..=0x9f => self.skip_arr((byte & 0x0f) as usize)?,
            0xa0..=0xbf => r.skip((byte & 0x1f) as usize)?,
            BIN8 | STR8 => {
                let len = r.u8()? as usize;
                r.skip(len)?;
            }
            BIN16 | STR16 => {
                let len = r.u16()? as usize;
                r.skip(len)?;
            }
            BIN32 | STR32 => {
                let len = r.u32()? as usize;
                r.skip(len)?;
            }
            EXT8 => {
                let len = r.u8()? as usize;
                r.skip(len + 1)?;
            }
            EXT16 => {
                let len = r.u16()? as usize;
                r.skip(len + 1)?;
            }
            EXT32 => {
                let len = r.u32()? as usize;
                r.skip(len + 1)?;
            }
            UINT8 | INT8 => r.skip(1)?,
            UINT16 | INT16 => r.skip(2)?,
            FLOAT32 | UINT32 | INT32 => r.skip(4)?,
            FLOAT64 | UINT64 | INT64 => r.skip(8)?,
            FIXEXT1 => r.skip(2)?,
            FIXEXT2 => r.skip(3)?,
            FIXEXT4 => r.skip(5)?,
            FIXEXT8 => r.skip(9)?,
            FIXEXT16 => r.skip(17)?,
            ARRAY16 => {
                let len = r.u16()? as usize;
                self.skip_arr(len)?;
            }
            ARRAY32 => {
                let len = r.u32()? as usize;
                self.skip_arr(len)?;
            }
            MAP16 => {
                let len = r.u16()? as usize;
                self.skip_obj(len)?;
            }
            MAP32 => {
                let len = r.u32()? as usize;
                self.skip_obj(len)?;
            }
        }
        Ok(self.reader.position() - start)
    }

    fn skip_arr(&mut self, len: usize) -> PackResult<()> {
        self.depth.enter()?;
        for _ in 0..len {
            self.skip_any()?;
        }
        self.depth.leave();
        Ok(())
    }

    fn skip_obj(&mut self, len: usize) -> PackResult<()> {
        self.depth.enter()?;
        for _ in 0..len {
            self.skip_any()?;
            self.skip_any()?;
        }
        self.depth.leave();
        Ok(())
    }

    /// 只展开一层：顶层容器的直接子容器以 `Raw` 字节返回
    pub fn read_level(&mut self) -> PackResult<PackValue> {
        let byte = self.reader.peek()?;
        if is_array(byte) {
            let len = self.read_arr_header()?;
            self.config.check_container_length(len)?;
            let mut arr = Vec::with_capacity(len.min(self.reader.remaining()));
            for _ in 0..len {
                arr.push(self.read_primitive_or_raw()?);
            }
            Ok(PackValue::Arr(arr))
        } else if is_map(byte) {
            let len = self.read_obj_header()?;
            self.config.check_container_length(len)?;
            let mut obj = PackMap::with_capacity(len.min(self.reader.remaining()));
            for _ in 0..len {
                let key = self.read_key()?;
                guard_key(&key)?;
                let value = self.read_primitive_or_raw()?;
                obj.insert(key, value);
            }
            Ok(PackValue::Obj(obj))
        } else {
            self.read_any()
        }
    }

    fn read_primitive_or_raw(&mut self) -> PackResult<PackValue> {
        let byte = self.reader.peek()?;
        if is_array(byte) || is_map(byte) {
            let start = self.reader.position();
            self.skip_any()?;
            let end = self.reader.position();
            Ok(PackValue::Raw(self.reader.data()[start..end].to_vec()))
        } else {
            self.read_any()
        }
    }
}

impl BinaryJsonDecoder for MsgPackDecoder<'_> {
    fn read_any(&mut self) -> PackResult<PackValue> {
        MsgPackDecoder::read_any(self)
    }

    fn position(&self) -> usize {
        self.reader.position()
    }
}

/// 解码一个 MessagePack 值
pub fn decode(data: &[u8]) -> PackResult<PackValue> {
    MsgPackDecoder::new(data).read_any()
}

/// 校验输入恰好包含一个完整的值
pub fn validate(data: &[u8]) -> PackResult<()> {
    let mut decoder = MsgPackDecoder::new(data);
    let size = decoder.skip_any()?;
    if size != data.len() {
        return Err(PackError::malformed(format!(
            "trailing bytes: value ends at {}, input has {}",
            size,
            data.len()
        )));
    }
    Ok(())
}
