//! 可增长输出缓冲区
//!
//! 基于 `BytesMut` 的写入器。多字节标量默认大端序，BSON 等小端格式使用 `_le` 变体。
//!
//! 回填写入：先用 [`Writer::reserve_slot`] 预留头部，写完主体后再用 `patch_*`
//! 覆盖预留位置。偏移量相对于当前 flush 窗口，嵌套容器各自记录自己的起点即可。

use bytes::{BufMut, BytesMut};

use crate::config::DEFAULT_INITIAL_CAPACITY;

#[derive(Debug, Clone)]
pub struct Writer {
    buf: BytesMut,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// 丢弃当前窗口中尚未 flush 的数据
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// 取出自上次 flush 以来写入的字节，保留底层分配
    pub fn flush(&mut self) -> Vec<u8> {
        self.buf.split().to_vec()
    }

    /// 当前窗口内已写入的字节数
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn ensure_capacity(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    pub fn f64(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    pub fn u32_le(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn i32_le(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn u64_le(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn i64_le(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn f64_le(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    pub fn u8u8(&mut self, marker: u8, v: u8) {
        self.buf.put_u8(marker);
        self.buf.put_u8(v);
    }

    pub fn u8u16(&mut self, marker: u8, v: u16) {
        self.buf.put_u8(marker);
        self.buf.put_u16(v);
    }

    pub fn u8u32(&mut self, marker: u8, v: u32) {
        self.buf.put_u8(marker);
        self.buf.put_u32(v);
    }

    pub fn u8u64(&mut self, marker: u8, v: u64) {
        self.buf.put_u8(marker);
        self.buf.put_u64(v);
    }

    pub fn u8f32(&mut self, marker: u8, v: f32) {
        self.buf.put_u8(marker);
        self.buf.put_f32(v);
    }

    pub fn u8f64(&mut self, marker: u8, v: f64) {
        self.buf.put_u8(marker);
        self.buf.put_f64(v);
    }

    pub fn buf(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// 写入 UTF-8 字符串，返回写入的字节数
    pub fn utf8(&mut self, s: &str) -> usize {
        self.buf.put_slice(s.as_bytes());
        s.len()
    }

    /// 预留 `n` 个占位字节，返回其偏移
    pub fn reserve_slot(&mut self, n: usize) -> usize {
        let at = self.buf.len();
        self.buf.put_bytes(0, n);
        at
    }

    pub fn patch_u8(&mut self, at: usize, v: u8) {
        self.buf[at] = v;
    }

    pub fn patch_u16(&mut self, at: usize, v: u16) {
        self.buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    pub fn patch_u32_le(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn patch_i32_le(&mut self, at: usize, v: i32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_big_endian() {
        let mut w = Writer::new();
        w.u8(0x01);
        w.u16(0x0203);
        w.u32(0x04050607);
        w.i32_le(1);
        assert_eq!(w.flush(), vec![1, 2, 3, 4, 5, 6, 7, 1, 0, 0, 0]);
    }

    #[test]
    fn test_flush_starts_new_window() {
        let mut w = Writer::with_capacity(4);
        w.utf8("abc");
        assert_eq!(w.flush(), b"abc".to_vec());
        assert_eq!(w.position(), 0);
        w.u8(b'x');
        assert_eq!(w.flush(), b"x".to_vec());
    }

    #[test]
    fn test_backpatch() {
        let mut w = Writer::new();
        w.u8(0xff);
        let slot = w.reserve_slot(4);
        let written = w.utf8("hello");
        w.patch_u32_le(slot, written as u32);
        assert_eq!(w.as_slice(), &[0xff, 5, 0, 0, 0, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_reset_discards_window() {
        let mut w = Writer::new();
        w.u64(42);
        w.reset();
        assert_eq!(w.position(), 0);
        assert!(w.flush().is_empty());
    }
}
