//! UBJSON 编码器
//!
//! 整数选最窄的标记，浮点数固定写 `D`。流式字符串和二进制先预留 `l` 长度槽，
//! 结束时回填实际字节数。

use super::constants::*;
use crate::codec::{max_utf8_len, BinaryJsonEncoder, Depth, StreamingBinaryJsonEncoder};
use crate::value::{PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Writer};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct UbjsonEncoder {
    writer: Writer,
    depth: Depth,
    /// 尚未回填的流式长度槽偏移
    pending_slots: Vec<usize>,
}

impl Default for UbjsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl UbjsonEncoder {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            depth: Depth::new(config.max_nesting_depth),
            pending_slots: Vec::new(),
        }
    }

    pub fn into_writer(self) -> Writer {
        self.writer
    }

    /// 对象键：长度前缀加 UTF-8 字节，不带 `S` 标记
    ///
    /// 最坏情况长度小于 255 时预留 `U`，否则预留 `l`，写完字节后回填。
    pub fn write_key(&mut self, key: &str) {
        let w = &mut self.writer;
        if max_utf8_len(key) < 0xff {
            w.u8(UINT8);
            let slot = w.reserve_slot(1);
            let len = w.utf8(key);
            w.patch_u8(slot, len as u8);
        } else {
            w.u8(INT32);
            let slot = w.reserve_slot(4);
            let len = w.utf8(key);
            w.patch_u32(slot, len as u32);
        }
    }

    fn open_slot(&mut self) {
        self.writer.u8(INT32);
        let slot = self.writer.reserve_slot(4);
        self.pending_slots.push(slot);
    }

    fn close_slot(&mut self) -> PackResult<()> {
        let slot = self
            .pending_slots
            .pop()
            .ok_or_else(|| PackError::unsupported("no streamed string or binary is open"))?;
        let len = self.writer.position() - slot - 4;
        let len = i32::try_from(len).map_err(|_| PackError::LimitExceeded {
            what: "UBJSON streamed value",
            len,
            max: i32::MAX as usize,
        })?;
        self.writer.patch_u32(slot, len as u32);
        trace!("UBJSON length patched: {} bytes at offset {}", len, slot);
        Ok(())
    }
}

impl BinaryJsonEncoder for UbjsonEncoder {
    fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    fn write_any(&mut self, value: &PackValue) -> PackResult<()> {
        match value {
            PackValue::Null | PackValue::Undefined => self.write_null(),
            PackValue::Bool(b) => self.write_boolean(*b),
            PackValue::Int(n) => self.write_integer(*n),
            PackValue::Float(f) => self.write_float(*f),
            PackValue::Str(s) => self.write_str(s),
            PackValue::Bin(b) => self.write_bin(b),
            PackValue::Arr(arr) => self.write_arr(arr)?,
            PackValue::Obj(obj) => self.write_obj(obj)?,
            PackValue::Raw(bytes) => self.writer.buf(bytes),
            PackValue::Ext(_) | PackValue::Bson(_) => {
                return Err(PackError::unsupported(format!(
                    "UBJSON cannot encode {}",
                    value.type_name()
                )))
            }
        }
        Ok(())
    }

    fn write_null(&mut self) {
        self.writer.u8(NULL);
    }

    fn write_undefined(&mut self) {
        self.writer.u8(NULL);
    }

    fn write_boolean(&mut self, b: bool) {
        self.writer.u8(if b { TRUE } else { FALSE });
    }

    fn write_integer(&mut self, n: i64) {
        let w = &mut self.writer;
        if (0..=u8::MAX as i64).contains(&n) {
            w.u8u8(UINT8, n as u8);
        } else if (i8::MIN as i64..=i8::MAX as i64).contains(&n) {
            w.u8(INT8);
            w.i8(n as i8);
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&n) {
            w.u8(INT16);
            w.i16(n as i16);
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&n) {
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

    fn write_str(&mut self, s: &str) {
        self.writer.u8(STRING);
        self.write_key(s);
    }

    /// 二进制写作 `[$U#<count>` 加原始字节
    fn write_bin(&mut self, b: &[u8]) {
        self.writer.u8(ARRAY_START);
        self.writer.u8(CONTAINER_TYPE);
        self.writer.u8(UINT8);
        self.writer.u8(CONTAINER_COUNT);
        self.write_integer(b.len() as i64);
        self.writer.buf(b);
    }

    fn write_arr(&mut self, arr: &[PackValue]) -> PackResult<()> {
        self.depth.enter()?;
        self.writer.u8(ARRAY_START);
        for item in arr {
            self.write_any(item)?;
        }
        self.writer.u8(ARRAY_END);
        self.depth.leave();
        Ok(())
    }

    fn write_obj(&mut self, obj: &PackMap) -> PackResult<()> {
        self.depth.enter()?;
        self.writer.u8(OBJECT_START);
        for (key, value) in obj {
            self.write_key(key);
            self.write_any(value)?;
        }
        self.writer.u8(OBJECT_END);
        self.depth.leave();
        Ok(())
    }

    fn write_root(&mut self, value: &PackValue) -> PackResult<()> {
        self.depth.reset();
        self.pending_slots.clear();
        self.write_any(value)
    }
}

impl StreamingBinaryJsonEncoder for UbjsonEncoder {
    fn write_start_arr(&mut self) {
        self.writer.u8(ARRAY_START);
    }

    fn write_arr_chunk(&mut self, item: &PackValue) -> PackResult<()> {
        self.write_any(item)
    }

    fn write_end_arr(&mut self) {
        self.writer.u8(ARRAY_END);
    }

    fn write_start_obj(&mut self) {
        self.writer.u8(OBJECT_START);
    }

    fn write_obj_chunk(&mut self, key: &str, value: &PackValue) -> PackResult<()> {
        self.write_key(key);
        self.write_any(value)
    }

    fn write_end_obj(&mut self) {
        self.writer.u8(OBJECT_END);
    }

    fn write_start_str(&mut self) {
        self.writer.u8(STRING);
        self.open_slot();
    }

    fn write_str_chunk(&mut self, chunk: &str) {
        self.writer.utf8(chunk);
    }

    fn write_end_str(&mut self) -> PackResult<()> {
        self.close_slot()
    }

    fn write_start_bin(&mut self) {
        self.writer.u8(ARRAY_START);
        self.writer.u8(CONTAINER_TYPE);
        self.writer.u8(UINT8);
        self.writer.u8(CONTAINER_COUNT);
        self.open_slot();
    }

    fn write_bin_chunk(&mut self, chunk: &[u8]) {
        self.writer.buf(chunk);
    }

    fn write_end_bin(&mut self) -> PackResult<()> {
        self.close_slot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack;

    fn enc(value: &PackValue) -> Vec<u8> {
        UbjsonEncoder::new().encode(value).unwrap()
    }

    #[test]
    fn test_integer_tags() {
        let cases: [(i64, u8); 12] = [
            (0, UINT8),
            (127, UINT8),
            (255, UINT8),
            (256, INT16),
            (-1, INT8),
            (-128, INT8),
            (-129, INT16),
            (32767, INT16),
            (32768, INT32),
            (65535, INT32),
            (1 << 31, INT64),
            (i64::MIN, INT64),
        ];
        for (n, tag) in cases {
            assert_eq!(enc(&PackValue::Int(n))[0], tag, "tag for {}", n);
        }
    }

    #[test]
    fn test_strings() {
        assert_eq!(enc(&pack!("ab")), vec![b'S', b'U', 2, b'a', b'b']);
        let long = "x".repeat(300);
        let bytes = enc(&PackValue::Str(long));
        assert_eq!(&bytes[..6], &[b'S', b'l', 0, 0, 1, 44]);
        // 64 个码元的上界已达 256 字节，预留 `l`
        let bytes = enc(&PackValue::Str("y".repeat(64)));
        assert_eq!(&bytes[..6], &[b'S', b'l', 0, 0, 0, 64]);
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            enc(&pack!({ "a": [true, null] })),
            vec![b'{', b'U', 1, b'a', b'[', b'T', b'Z', b']', b'}']
        );
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            enc(&PackValue::Bin(vec![1, 2])),
            vec![b'[', b'$', b'U', b'#', b'U', 2, 1, 2]
        );
    }

    #[test]
    fn test_streaming_backpatch() {
        let mut encoder = UbjsonEncoder::new();
        encoder.write_start_arr();
        encoder.write_start_str();
        encoder.write_str_chunk("ab");
        encoder.write_str_chunk("c");
        encoder.write_end_str().unwrap();
        encoder.write_start_bin();
        encoder.write_bin_chunk(&[9]);
        encoder.write_end_bin().unwrap();
        encoder.write_end_arr();
        let bytes = encoder.writer().flush();
        assert_eq!(
            bytes,
            vec![
                b'[', b'S', b'l', 0, 0, 0, 3, b'a', b'b', b'c', b'[', b'$', b'U', b'#', b'l', 0,
                0, 0, 1, 9, b']'
            ]
        );
    }

    #[test]
    fn test_end_without_start() {
        assert!(UbjsonEncoder::new().write_end_str().is_err());
    }
}
