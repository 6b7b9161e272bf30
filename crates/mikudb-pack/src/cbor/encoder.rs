//! CBOR 编码器
//!
//! - `fast`：JSON 子集，浮点数固定写 64 位
//! - `full`：支持二进制、标签、undefined 和预编码字节，浮点数能无损收窄时写 32 位
//! - `stable`：`full` 加规范键序（先比 UTF-8 长度，再逐字节比较）
//! - `dag`：`stable` 加 DAG-CBOR 约束，只保留标签 42，浮点数固定 64 位，
//!   NaN、无穷和 undefined 写作 null

use super::constants::*;
use crate::codec::{BinaryJsonEncoder, Depth, StreamingBinaryJsonEncoder};
use crate::value::{Extension, PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Writer};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborProfile {
    Fast,
    Full,
    Stable,
    Dag,
}

impl fmt::Display for CborProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CborProfile::Fast => write!(f, "fast"),
            CborProfile::Full => write!(f, "full"),
            CborProfile::Stable => write!(f, "stable"),
            CborProfile::Dag => write!(f, "dag"),
        }
    }
}

/// 规范键序：短键在前，等长时逐字节比较
pub fn canonical_key_order(a: &str, b: &str) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct CborEncoder {
    writer: Writer,
    profile: CborProfile,
    depth: Depth,
}

impl Default for CborEncoder {
    fn default() -> Self {
        Self::full()
    }
}

impl CborEncoder {
    pub fn new(profile: CborProfile) -> Self {
        Self::with_config(profile, &CodecConfig::default())
    }

    pub fn with_config(profile: CborProfile, config: &CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            profile,
            depth: Depth::new(config.max_nesting_depth),
        }
    }

    pub fn fast() -> Self {
        Self::new(CborProfile::Fast)
    }

    pub fn full() -> Self {
        Self::new(CborProfile::Full)
    }

    pub fn stable() -> Self {
        Self::new(CborProfile::Stable)
    }

    pub fn dag() -> Self {
        Self::new(CborProfile::Dag)
    }

    pub fn profile(&self) -> CborProfile {
        self.profile
    }

    pub fn into_writer(self) -> Writer {
        self.writer
    }

    fn unsupported(&self, value: &PackValue) -> PackError {
        PackError::unsupported(format!(
            "CBOR {} encoder cannot write {}",
            self.profile,
            value.type_name()
        ))
    }

    fn is_fast(&self) -> bool {
        self.profile == CborProfile::Fast
    }

    fn sorts_keys(&self) -> bool {
        matches!(self.profile, CborProfile::Stable | CborProfile::Dag)
    }

    /// 写入主类型和参数，参数按最短形式编码
    pub fn write_major(&mut self, major: u8, n: u64) {
        let m = major << 5;
        let w = &mut self.writer;
        if n < MINOR_U8 as u64 {
            w.u8(m | n as u8);
        } else if n <= 0xff {
            w.u8u8(m | MINOR_U8, n as u8);
        } else if n <= 0xffff {
            w.u8u16(m | MINOR_U16, n as u16);
        } else if n <= 0xffff_ffff {
            w.u8u32(m | MINOR_U32, n as u32);
        } else {
            w.u8u64(m | MINOR_U64, n);
        }
    }

    pub fn write_tag(&mut self, ext: &Extension) -> PackResult<()> {
        if self.profile == CborProfile::Dag && ext.tag != TAG_CID {
            return self.write_any(&ext.value);
        }
        self.write_major(MAJOR_TAG, ext.tag);
        self.write_any(&ext.value)
    }

    fn write_entries<'v, I>(&mut self, entries: I) -> PackResult<()>
    where
        I: Iterator<Item = (&'v String, &'v PackValue)>,
    {
        for (key, value) in entries {
            self.write_str(key);
            self.write_any(value)?;
        }
        Ok(())
    }
}

impl BinaryJsonEncoder for CborEncoder {
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
            PackValue::Undefined if !self.is_fast() => self.write_undefined(),
            PackValue::Bin(b) if !self.is_fast() => self.write_bin(b),
            PackValue::Ext(ext) if !self.is_fast() => self.write_tag(ext)?,
            PackValue::Raw(bytes) if !self.is_fast() => self.writer.buf(bytes),
            other => return Err(self.unsupported(other)),
        }
        Ok(())
    }

    fn write_null(&mut self) {
        self.writer.u8(NULL);
    }

    fn write_undefined(&mut self) {
        if self.profile == CborProfile::Dag {
            self.writer.u8(NULL);
        } else {
            self.writer.u8(UNDEFINED);
        }
    }

    fn write_boolean(&mut self, b: bool) {
        self.writer.u8(if b { TRUE } else { FALSE });
    }

    fn write_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_major(MAJOR_UINT, n as u64);
        } else {
            self.write_major(MAJOR_NINT, (-1 - n) as u64);
        }
    }

    fn write_float(&mut self, f: f64) {
        match self.profile {
            CborProfile::Fast => self.writer.u8f64(FLOAT64, f),
            CborProfile::Dag => {
                if f.is_finite() {
                    self.writer.u8f64(FLOAT64, f);
                } else {
                    self.writer.u8(NULL);
                }
            }
            CborProfile::Full | CborProfile::Stable => {
                let narrow = f as f32;
                if narrow as f64 == f {
                    self.writer.u8f32(FLOAT32, narrow);
                } else {
                    self.writer.u8f64(FLOAT64, f);
                }
            }
        }
    }

    fn write_str(&mut self, s: &str) {
        self.write_major(MAJOR_STR, s.len() as u64);
        self.writer.utf8(s);
    }

    fn write_bin(&mut self, b: &[u8]) {
        self.write_major(MAJOR_BIN, b.len() as u64);
        self.writer.buf(b);
    }

    fn write_arr(&mut self, arr: &[PackValue]) -> PackResult<()> {
        self.depth.enter()?;
        self.write_major(MAJOR_ARR, arr.len() as u64);
        for item in arr {
            self.write_any(item)?;
        }
        self.depth.leave();
        Ok(())
    }

    fn write_obj(&mut self, obj: &PackMap) -> PackResult<()> {
        self.depth.enter()?;
        self.write_major(MAJOR_MAP, obj.len() as u64);
        if self.sorts_keys() {
            let mut entries: Vec<_> = obj.iter().collect();
            entries.sort_by(|a, b| canonical_key_order(a.0, b.0));
            self.write_entries(entries.into_iter())?;
        } else {
            self.write_entries(obj.iter())?;
        }
        self.depth.leave();
        Ok(())
    }

    fn write_root(&mut self, value: &PackValue) -> PackResult<()> {
        self.depth.reset();
        self.write_any(value)
    }
}

impl StreamingBinaryJsonEncoder for CborEncoder {
    fn write_start_arr(&mut self) {
        self.writer.u8(ARR_INDEFINITE);
    }

    fn write_arr_chunk(&mut self, item: &PackValue) -> PackResult<()> {
        self.write_any(item)
    }

    fn write_end_arr(&mut self) {
        self.writer.u8(BREAK);
    }

    fn write_start_obj(&mut self) {
        self.writer.u8(MAP_INDEFINITE);
    }

    fn write_obj_chunk(&mut self, key: &str, value: &PackValue) -> PackResult<()> {
        self.write_str(key);
        self.write_any(value)
    }

    fn write_end_obj(&mut self) {
        self.writer.u8(BREAK);
    }

    fn write_start_str(&mut self) {
        self.writer.u8(STR_INDEFINITE);
    }

    fn write_str_chunk(&mut self, chunk: &str) {
        self.write_str(chunk);
    }

    fn write_end_str(&mut self) -> PackResult<()> {
        self.writer.u8(BREAK);
        Ok(())
    }

    fn write_start_bin(&mut self) {
        self.writer.u8(BIN_INDEFINITE);
    }

    fn write_bin_chunk(&mut self, chunk: &[u8]) {
        self.write_bin(chunk);
    }

    fn write_end_bin(&mut self) -> PackResult<()> {
        self.writer.u8(BREAK);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack;

    fn enc(value: &PackValue) -> Vec<u8> {
        CborEncoder::full().encode(value).unwrap()
    }

    #[test]
    fn test_integers() {
        assert_eq!(enc(&pack!(0)), vec![0x00]);
        assert_eq!(enc(&pack!(23)), vec![0x17]);
        assert_eq!(enc(&pack!(24)), vec![0x18, 0x18]);
        assert_eq!(enc(&pack!(1000)), vec![0x19, 0x03, 0xe8]);
        assert_eq!(enc(&PackValue::Int(-1)), vec![0x20]);
        assert_eq!(enc(&PackValue::Int(-100)), vec![0x38, 0x63]);
        assert_eq!(enc(&PackValue::Int(i64::MIN))[0], 0x3b);
        assert_eq!(enc(&PackValue::Int(1 << 40))[0], 0x1b);
    }

    #[test]
    fn test_floats_by_profile() {
        assert_eq!(enc(&pack!(1.5)), vec![0xfa, 0x3f, 0xc0, 0x00, 0x00]);
        assert_eq!(enc(&pack!(0.1))[0], 0xfb);
        assert_eq!(CborEncoder::fast().encode(&pack!(1.5)).unwrap()[0], 0xfb);
        assert_eq!(CborEncoder::dag().encode(&pack!(1.5)).unwrap()[0], 0xfb);
        assert_eq!(
            CborEncoder::dag().encode(&pack!(f64::NAN)).unwrap(),
            vec![NULL]
        );
    }

    #[test]
    fn test_strings_and_containers() {
        assert_eq!(enc(&pack!("a")), vec![0x61, b'a']);
        assert_eq!(enc(&pack!([1, true])), vec![0x82, 0x01, 0xf5]);
        assert_eq!(enc(&pack!({ "a": null })), vec![0xa1, 0x61, b'a', 0xf6]);
        assert_eq!(enc(&PackValue::Bin(vec![7])), vec![0x41, 0x07]);
    }

    #[test]
    fn test_canonical_key_order() {
        let value = pack!({ "bb": 1, "a": 2, "c": 3 });
        let bytes = CborEncoder::stable().encode(&value).unwrap();
        assert_eq!(
            bytes,
            vec![0xa3, 0x61, b'a', 0x02, 0x61, b'c', 0x03, 0x62, b'b', b'b', 0x01]
        );
    }

    #[test]
    fn test_tags() {
        let value = PackValue::Ext(Extension::new(1, pack!(1000)));
        assert_eq!(enc(&value), vec![0xc1, 0x19, 0x03, 0xe8]);

        let dag = CborEncoder::dag().encode(&value).unwrap();
        assert_eq!(dag, vec![0x19, 0x03, 0xe8]);

        let cid = PackValue::Ext(Extension::new(42, PackValue::Bin(vec![0])));
        assert_eq!(
            CborEncoder::dag().encode(&cid).unwrap(),
            vec![0xd8, 0x2a, 0x41, 0x00]
        );
    }

    #[test]
    fn test_undefined() {
        assert_eq!(enc(&PackValue::Undefined), vec![UNDEFINED]);
        assert_eq!(
            CborEncoder::dag().encode(&PackValue::Undefined).unwrap(),
            vec![NULL]
        );
        assert!(CborEncoder::fast().encode(&PackValue::Undefined).is_err());
    }

    #[test]
    fn test_streaming() {
        let mut encoder = CborEncoder::full();
        encoder.write_start_obj();
        encoder.write_obj_chunk("a", &pack!(1)).unwrap();
        encoder.write_end_obj();
        encoder.write_start_str();
        encoder.write_str_chunk("x");
        encoder.write_str_chunk("y");
        encoder.write_end_str().unwrap();
        let bytes = encoder.writer().flush();
        assert_eq!(
            bytes,
            vec![0xbf, 0x61, b'a', 0x01, 0xff, 0x7f, 0x61, b'x', 0x61, b'y', 0xff]
        );
    }
}
