//! 输入游标
//!
//! 借用输入切片的读取器，所有读取都做边界检查。

use crate::error::{PackError, PackResult};

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    x: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, x: 0 }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.data = data;
        self.x = 0;
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.x
    }

    pub fn set_position(&mut self, x: usize) {
        self.x = x;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.x)
    }

    pub fn is_at_end(&self) -> bool {
        self.x >= self.data.len()
    }

    fn eof(&self, need: usize) -> PackError {
        PackError::UnexpectedEof {
            offset: self.x,
            need,
        }
    }

    /// 查看下一个字节但不移动游标
    pub fn peek(&self) -> PackResult<u8> {
        self.data.get(self.x).copied().ok_or_else(|| self.eof(1))
    }

    /// 查看游标之后第 `offset` 个字节
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.x + offset).copied()
    }

    pub fn skip(&mut self, n: usize) -> PackResult<()> {
        if n > self.remaining() {
            return Err(self.eof(n - self.remaining()));
        }
        self.x += n;
        Ok(())
    }

    pub fn buf(&mut self, n: usize) -> PackResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.eof(n - self.remaining()));
        }
        let slice = &self.data[self.x..self.x + n];
        self.x += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> PackResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.buf(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> PackResult<u8> {
        let b = self.peek()?;
        self.x += 1;
        Ok(b)
    }

    pub fn i8(&mut self) -> PackResult<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> PackResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> PackResult<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> PackResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> PackResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> PackResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> PackResult<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> PackResult<f32> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> PackResult<f64> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    pub fn u32_le(&mut self) -> PackResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32_le(&mut self) -> PackResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64_le(&mut self) -> PackResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64_le(&mut self) -> PackResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f64_le(&mut self) -> PackResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// 读取 `n` 字节并校验为 UTF-8
    pub fn utf8(&mut self, n: usize) -> PackResult<&'a str> {
        let bytes = self.buf(n)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// 读取以 NUL 结尾的 UTF-8 字符串，消费结尾的 NUL
    pub fn cstring(&mut self) -> PackResult<&'a str> {
        let rest = &self.data[self.x.min(self.data.len())..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| PackError::malformed("unterminated cstring"))?;
        let s = std::str::from_utf8(&rest[..end])?;
        self.x += end + 1;
        Ok(s)
    }
}
