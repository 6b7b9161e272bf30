//! MessagePack 编码器
//!
//! 三种配置共用一个实现：
//! - `fast`：只接受 JSON 可表示的值
//! - `full`：额外支持二进制、扩展值、预编码字节和 undefined
//! - `stable`：在 `full` 的基础上按字典序写对象键，输出确定

use super::constants::*;
use crate::codec::{max_utf8_len, BinaryJsonEncoder, Depth};
use crate::value::{Extension, PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Writer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgPackProfile {
    Fast,
    Full,
    Stable,
}

impl fmt::Display for MsgPackProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgPackProfile::Fast => write!(f, "fast"),
            MsgPackProfile::Full => write!(f, "full"),
            MsgPackProfile::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MsgPackEncoder {
    writer: Writer,
    profile: MsgPackProfile,
    depth: Depth,
}

impl Default for MsgPackEncoder {
    fn default() -> Self {
        Self::full()
    }
}

impl MsgPackEncoder {
    pub fn new(profile: MsgPackProfile) -> Self {
        Self::with_config(profile, &CodecConfig::default())
    }

    pub fn with_config(profile: MsgPackProfile, config: &CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            profile,
            depth: Depth::new(config.max_nesting_depth),
        }
    }

    pub fn fast() -> Self {
        Self::new(MsgPackProfile::Fast)
    }

    pub fn full() -> Self {
        Self::new(MsgPackProfile::Full)
    }

    pub fn stable() -> Self {
        Self::new(MsgPackProfile::Stable)
    }

    pub fn profile(&self) -> MsgPackProfile {
        self.profile
    }

    pub fn into_writer(self) -> Writer {
        self.writer
    }

    fn unsupported(&self, value: &PackValue) -> PackError {
        PackError::unsupported(format!(
            "MessagePack {} encoder cannot write {}",
            self.profile,
            value.type_name()
        ))
    }

    pub fn write_arr_hdr(&mut self, len: usize) {
        if len <= 0x0f {
            self.writer.u8(FIXARRAY | len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(ARRAY16, len as u16);
        } else {
            self.writer.u8u32(ARRAY32, len as u32);
        }
    }

    pub fn write_obj_hdr(&mut self, len: usize) {
        if len <= 0x0f {
            self.writer.u8(FIXMAP | len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(MAP16, len as u16);
        } else {
            self.writer.u8u32(MAP32, len as u32);
        }
    }

    pub fn write_str_hdr(&mut self, len: usize) {
        if len <= 0x1f {
            self.writer.u8(FIXSTR | len as u8);
        } else if len <= 0xff {
            self.writer.u8u8(STR8, len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(STR16, len as u16);
        } else {
            self.writer.u8u32(STR32, len as u32);
        }
    }

    pub fn write_bin_hdr(&mut self, len: usize) {
        if len <= 0xff {
            self.writer.u8u8(BIN8, len as u8);
        } else if len <= 0xffff {
            self.writer.u8u16(BIN16, len as u16);
        } else {
            self.writer.u8u32(BIN32, len as u32);
        }
    }

    /// 写入扩展值，载荷必须是二进制，类型号必须在一个字节内
    pub fn write_ext(&mut self, ext: &Extension) -> PackResult<()> {
        let tag = u8::try_from(ext.tag).map_err(|_| {
            PackError::unsupported(format!("MessagePack ext type {} exceeds one byte", ext.tag))
        })?;
        let data = match ext.value.as_ref() {
            PackValue::Bin(data) => data,
            other => {
                return Err(PackError::unsupported(format!(
                    "MessagePack ext payload must be binary, got {}",
                    other.type_name()
                )))
            }
        };
        let w = &mut self.writer;
        match data.len() {
            1 => w.u8(FIXEXT1),
            2 => w.u8(FIXEXT2),
            4 => w.u8(FIXEXT4),
            8 => w.u8(FIXEXT8),
            16 => w.u8(FIXEXT16),
            n if n <= 0xff => w.u8u8(EXT8, n as u8),
            n if n <= 0xffff => w.u8u16(EXT16, n as u16),
            n => w.u8u32(EXT32, n as u32),
        }
        w.u8(tag);
        w.buf(data);
        Ok(())
    }

    fn allows_extensions(&self) -> bool {
        self.profile != MsgPackProfile::Fast
    }
}

impl BinaryJsonEncoder for MsgPackEncoder {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn write_any(&mut self, value: &PackValue) -> PackResult<()> {
        match value {
            PackValue::Null => self.write_null(),
            PackValue::Bool(b) => self.write_boolean(*b),
            PackValue::Int(n) => self.write_integer(*n),
            PackValue::Float(f) => self.write_float(*f),
            PackValue::Str(s) => self.write_str(s),
            PackValue::Arr(arr) => self.write_arr(arr)?,
            PackValue::Obj(obj) => self.write_obj(obj)?,
            PackValue::Undefined if self.allows_extensions() => self.write_undefined(),
            PackValue::Bin(b) if self.allows_extensions() => self.write_bin(b),
            PackValue::Ext(ext) if self.allows_extensions() => self.write_ext(ext)?,
            PackValue::Raw(bytes) if self.allows_extensions() => self.writer.buf(bytes),
            other => return Err(self.unsupported(other)),
        }
        Ok(())
    }

    fn write_null(&mut self) {
        self.writer.u8(NIL);
    }

    fn write_undefined(&mut self) {
        self.writer.u8(UNDEFINED);
    }

    fn write_boolean(&mut self, b: bool) {
        self.writer.u8(if b { TRUE } else { FALSE });
    }

    fn write_integer(&mut self, n: i64) {
        let w = &mut self.writer;
        if n >= 0 {
            let u = n as u64;
            if u <= POSITIVE_FIXINT_MAX as u64 {
                w.u8(u as u8);
            } else if u <= 0xff {
                w.u8u8(UINT8, u as u8);
            } else if u <= 0xffff {
                w.u8u16(UINT16, u as u16);
            } else if u <= 0xffff_ffff {
                w.u8u32(UINT32, u as u32);
            } else {
                w.u8u64(UINT64, u);
            }
        } else if n >= -32 {
            w.u8(n as i8 as u8);
        } else if n >= i8::MIN as i64 {
            w.u8(INT8);
            w.i8(n as i8);
        } else if n >= i16::MIN as i64 {
            w.u8(INT16);
            w.i16(n as i16);
        } else if n >= i32::MIN as i64 {
            w.u8(INT32);
            w.i32(n as i32);
        } else {
            w.u8(INT64);
            w.i64(n);
        }
    }

    fn write_float(&mut self, f: f64) {
        self.writer.u8f64(FLOAT64, f);
    }

    /// 长度类别按最坏情况预留，写完后回填实际字节数
    fn write_str(&mut self, s: &str) {
        let max_size = max_utf8_len(s);
        let w = &mut self.writer;
        if max_size <= 0x1f {
            let slot = w.reserve_slot(1);
            let len = w.utf8(s);
            w.patch_u8(slot, FIXSTR | len as u8);
        } else if max_size <= 0xff {
            w.u8(STR8);
            let slot = w.reserve_slot(1);
            let len = w.utf8(s);
            w.patch_u8(slot, len as u8);
        } else if max_size <= 0xffff {
            w.u8(STR16);
            let slot = w.reserve_slot(2);
            let len = w.utf8(s);
            w.patch_u16(slot, len as u16);
        } else {
            w.u8(STR32);
            let slot = w.reserve_slot(4);
            let len = w.utf8(s);
            w.patch_u32(slot, len as u32);
        }
    }

    fn write_bin(&mut self, b: &[u8]) {
        self.write_bin_hdr(b.len());
        self.writer.buf(b);
    }

    fn write_arr(&mut self, arr: &[PackValue]) -> PackResult<()> {
        self.depth.enter()?;
        self.write_arr_hdr(arr.len());
        for item in arr {
            self.write_any(item)?;
        }
        self.depth.leave();
        Ok(())
    }

    fn write_obj(&mut self, obj: &PackMap) -> PackResult<()> {
        self.depth.enter()?;
        self.write_obj_hdr(obj.len());
        if self.profile == MsgPackProfile::Stable {
            let mut entries: Vec<_> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                self.write_str(key);
                self.write_any(value)?;
            }
        } else {
            for (key, value) in obj {
                self.write_str(key);
                self.write_any(value)?;
            }
        }
        self.depth.leave();
        Ok(())
    }

    fn write_root(&mut self, value: &PackValue) -> PackResult<()> {
        self.depth.reset();
        self.write_any(value)
    }
}
