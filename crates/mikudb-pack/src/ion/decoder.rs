//! Ion 二进制解码器
//!
//! 校验版本标记后，先消费开头带 `$ion_symbol_table` 注解的结构体，每个都在导入链上
//! 叠加一层本地符号；随后解码根值。NOP 填充在任意位置都会被跳过。

use super::constants::*;
use super::import::Import;
use crate::codec::{BinaryJsonDecoder, Depth};
use crate::value::{PackMap, PackValue};
use mikudb_common::{CodecConfig, PackError, PackResult, Reader};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct IonDecoder<'a> {
    reader: Reader<'a>,
    config: CodecConfig,
    depth: Depth,
    symbols: Arc<Import>,
}

/// 类型描述符
#[derive(Debug, Clone, Copy)]
struct Descriptor {
    type_code: u8,
    len_code: u8,
    offset: usize,
}

impl Descriptor {
    fn is_nop(&self) -> bool {
        self.type_code == TYPE_NULL && self.len_code != LEN_NULL
    }
}

impl<'a> IonDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, CodecConfig::default())
    }

    pub fn with_config(data: &'a [u8], config: CodecConfig) -> Self {
        Self {
            reader: Reader::new(data),
            config,
            depth: Depth::new(config.max_nesting_depth),
            symbols: Arc::new(Import::system()),
        }
    }

    /// 当前生效的符号表
    pub fn symbols(&self) -> &Import {
        &self.symbols
    }

    /// 解码一个完整的 Ion 流：版本标记、本地符号表、根值
    pub fn decode(&mut self) -> PackResult<PackValue> {
        self.reader.set_position(0);
        self.depth.reset();
        self.symbols = Arc::new(Import::system());
        let bvm = self.reader.buf(BVM.len())?;
        if bvm != BVM {
            return Err(PackError::malformed("invalid Ion binary version marker"));
        }
        loop {
            self.skip_padding(self.reader.data().len())?;
            if !self.read_symbol_table()? {
                break;
            }
        }
        self.read_any()
    }

    fn read_descriptor(&mut self) -> PackResult<Descriptor> {
        let offset = self.reader.position();
        let byte = self.reader.u8()?;
        Ok(Descriptor {
            type_code: byte >> 4,
            len_code: byte & 0x0f,
            offset,
        })
    }

    fn read_vuint(&mut self) -> PackResult<usize> {
        let mut n: usize = 0;
        loop {
            let byte = self.reader.u8()?;
            if n > usize::MAX >> 7 {
                return Err(PackError::malformed("Ion VarUInt overflow"));
            }
            n = (n << 7) | (byte & 0x7f) as usize;
            if byte & 0x80 != 0 {
                return Ok(n);
            }
        }
    }

    fn read_uint(&mut self, len: usize) -> PackResult<u64> {
        if len > 8 {
            return Err(PackError::malformed(format!(
                "Ion integer of {} bytes exceeds 64 bits",
                len
            )));
        }
        let bytes = self.reader.buf(len)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    fn read_len(&mut self, len_code: u8) -> PackResult<usize> {
        if len_code == LEN_VAR {
            self.read_vuint()
        } else {
            Ok(len_code as usize)
        }
    }

    /// 声明长度对应的结束位置，超出剩余输入时报错
    fn end_of(&self, len: usize) -> PackResult<usize> {
        if len > self.reader.remaining() {
            return Err(PackError::malformed(format!(
                "incorrect length: {} declared at offset {}, {} bytes remain",
                len,
                self.reader.position(),
                self.reader.remaining()
            )));
        }
        Ok(self.reader.position() + len)
    }

    /// 跳过 `end` 之前的 NOP 填充
    fn skip_padding(&mut self, end: usize) -> PackResult<()> {
        while self.reader.position() < end {
            let byte = self.reader.peek()?;
            if byte >> 4 != TYPE_NULL || byte & 0x0f == LEN_NULL {
                break;
            }
            let desc = self.read_descriptor()?;
            let len = self.read_len(desc.len_code)?;
            self.reader.skip(len)?;
        }
        Ok(())
    }

    /// 游标处是 `$ion_symbol_table::{...}` 时读取它并叠加一层符号，返回是否读取
    fn read_symbol_table(&mut self) -> PackResult<bool> {
        let start = self.reader.position();
        if self.reader.is_at_end() {
            return Ok(false);
        }
        let desc = self.read_descriptor()?;
        if desc.type_code != TYPE_ANNOTATION || desc.len_code == LEN_NULL {
            self.reader.set_position(start);
            return Ok(false);
        }
        let len = self.read_len(desc.len_code)?;
        self.end_of(len)?;
        let annot_len = self.read_vuint()?;
        let annot_end = self.end_of(annot_len)?;
        let first = self.read_vuint()?;
        if first != SID_ION_SYMBOL_TABLE {
            self.reader.set_position(start);
            return Ok(false);
        }
        self.reader.set_position(annot_end);
        let table = self.read_any()?;
        let mut symbols = Vec::new();
        if let PackValue::Obj(fields) = &table {
            if let Some(PackValue::Arr(list)) = fields.get(SYSTEM_SYMBOLS[SID_SYMBOLS - 1]) {
                symbols = list
                    .iter()
                    .map(|item| match item {
                        PackValue::Str(s) => s.clone(),
                        _ => String::new(),
                    })
                    .collect();
            }
        } else {
            debug!("Ion symbol table at offset {} is not a struct", start);
            return Err(PackError::malformed("Ion symbol table must be a struct"));
        }
        trace!(
            "Ion symbol table at offset {}: {} local symbols",
            start,
            symbols.len()
        );
        self.symbols = Arc::new(Import::child(self.symbols.clone(), symbols));
        Ok(true)
    }

    pub fn read_any(&mut self) -> PackResult<PackValue> {
        let mut desc = self.read_descriptor()?;
        while desc.is_nop() {
            let len = self.read_len(desc.len_code)?;
            self.reader.skip(len)?;
            desc = self.read_descriptor()?;
        }
        self.read_value(desc)
    }

    fn read_value(&mut self, desc: Descriptor) -> PackResult<PackValue> {
        if desc.len_code == LEN_NULL && desc.type_code != TYPE_ANNOTATION {
            return Ok(PackValue::Null);
        }
        match desc.type_code {
            TYPE_BOOL => match desc.len_code {
                0 => Ok(PackValue::Bool(false)),
                1 => Ok(PackValue::Bool(true)),
                _ => Err(PackError::malformed(format!(
                    "invalid Ion bool length {} at offset {}",
                    desc.len_code, desc.offset
                ))),
            },
            TYPE_POS_INT => {
                let len = self.read_len(desc.len_code)?;
                let magnitude = self.read_uint(len)?;
                Ok(match i64::try_from(magnitude) {
                    Ok(n) => PackValue::Int(n),
                    Err(_) => PackValue::Float(magnitude as f64),
                })
            }
            TYPE_NEG_INT => {
                let len = self.read_len(desc.len_code)?;
                let magnitude = self.read_uint(len)?;
                if magnitude == 0 {
                    return Err(PackError::malformed("Ion negative zero integer"));
                }
                let n = -(magnitude as i128);
                Ok(match i64::try_from(n) {
                    Ok(n) => PackValue::Int(n),
                    Err(_) => PackValue::Float(n as f64),
                })
            }
            TYPE_FLOAT => match self.read_len(desc.len_code)? {
                0 => Ok(PackValue::Float(0.0)),
                4 => Ok(PackValue::Float(self.reader.f32()? as f64)),
                8 => Ok(PackValue::Float(self.reader.f64()?)),
                n => Err(PackError::malformed(format!("invalid Ion float length {}", n))),
            },
            TYPE_DECIMAL => Err(PackError::malformed("unsupported Ion type: decimal")),
            TYPE_TIMESTAMP => Err(PackError::malformed("unsupported Ion type: timestamp")),
            TYPE_SYMBOL => {
                let len = self.read_len(desc.len_code)?;
                let sid = self.read_uint(len)? as usize;
                self.symbol_text(sid).map(PackValue::Str)
            }
            TYPE_STRING => {
                let len = self.read_len(desc.len_code)?;
                self.config.check_string_length(len)?;
                Ok(PackValue::Str(self.reader.utf8(len)?.to_string()))
            }
            TYPE_CLOB | TYPE_BLOB => {
                let len = self.read_len(desc.len_code)?;
                self.config.check_string_length(len)?;
                Ok(PackValue::Bin(self.reader.buf(len)?.to_vec()))
            }
            TYPE_LIST | TYPE_SEXP => {
                let len = self.read_len(desc.len_code)?;
                self.read_list(len)
            }
            TYPE_STRUCT => {
                // L=1 是按字段 id 排序的结构体，长度总是随后的 VarUInt
                let len = if desc.len_code == 1 {
                    self.read_vuint()?
                } else {
                    self.read_len(desc.len_code)?
                };
                self.read_struct(len)
            }
            TYPE_ANNOTATION => {
                if desc.len_code == LEN_NULL {
                    return Err(PackError::InvalidTypeMarker {
                        marker: 0xef,
                        offset: desc.offset,
                    });
                }
                let len = self.read_len(desc.len_code)?;
                let end = self.end_of(len)?;
                let annot_len = self.read_vuint()?;
                self.reader.skip(annot_len)?;
                // 注解包装内不能再嵌套注解包装
                let inner = self.read_descriptor()?;
                if inner.type_code == TYPE_ANNOTATION {
                    return Err(PackError::malformed(format!(
                        "nested Ion annotation wrapper at offset {}",
                        inner.offset
                    )));
                }
                self.depth.enter()?;
                let value = self.read_value(inner)?;
                self.depth.leave();
                self.expect_end(end)?;
                Ok(value)
            }
            _ => Err(PackError::InvalidTypeMarker {
                marker: (desc.type_code << 4) | desc.len_code,
                offset: desc.offset,
            }),
        }
    }

    fn symbol_text(&self, sid: usize) -> PackResult<String> {
        self.symbols
            .get_text(sid)
            .map(str::to_string)
            .ok_or_else(|| PackError::malformed(format!("unknown Ion symbol id {}", sid)))
    }

    fn expect_end(&self, end: usize) -> PackResult<()> {
        if self.reader.position() != end {
            return Err(PackError::malformed(format!(
                "Ion container ends at {}, declared end {}",
                self.reader.position(),
                end
            )));
        }
        Ok(())
    }

    fn read_list(&mut self, len: usize) -> PackResult<PackValue> {
        self.depth.enter()?;
        let end = self.end_of(len)?;
        let mut items = Vec::new();
        loop {
            self.skip_padding(end)?;
            if self.reader.position() >= end {
                break;
            }
            self.config.check_container_length(items.len() + 1)?;
            items.push(self.read_any()?);
        }
        self.expect_end(end)?;
        self.depth.leave();
        Ok(PackValue::Arr(items))
    }

    fn read_struct(&mut self, len: usize) -> PackResult<PackValue> {
        self.depth.enter()?;
        let end = self.end_of(len)?;
        let mut obj = PackMap::new();
        while self.reader.position() < end {
            let sid = self.read_vuint()?;
            let desc = self.read_descriptor()?;
            if desc.is_nop() {
                let len = self.read_len(desc.len_code)?;
                self.reader.skip(len)?;
                continue;
            }
            let key = self.symbol_text(sid)?;
            self.config.check_container_length(obj.len() + 1)?;
            let value = self.read_value(desc)?;
            obj.insert(key, value);
        }
        self.expect_end(end)?;
        self.depth.leave();
        Ok(PackValue::Obj(obj))
    }
}

impl BinaryJsonDecoder for IonDecoder<'_> {
    fn read_any(&mut self) -> PackResult<PackValue> {
        IonDecoder::read_any(self)
    }

    fn position(&self) -> usize {
        self.reader.position()
    }
}

pub fn decode(data: &[u8]) -> PackResult<PackValue> {
    IonDecoder::new(data).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ion::IonEncoder;
    use crate::pack;

    fn roundtrip(value: &PackValue) -> PackValue {
        let bytes = IonEncoder::new().encode(value).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let value = pack!({
            "n": null,
            "b": true,
            "i": (PackValue::Int(i64::MIN)),
            "j": (PackValue::Int(i64::MAX)),
            "f": 0.5,
            "s": ("x".repeat(20)),
            "bin": (PackValue::Bin(vec![1, 2, 3])),
            "nested": { "list": [1, [2, [3, "x"]], null, false] }
        });
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_bad_bvm() {
        assert!(matches!(
            decode(&[0xe0, 0x01, 0x01, 0xea, 0x0f]),
            Err(PackError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_nop_padding() {
        // NOP(0) NOP(1 字节) [NOP 1] 0x21 0x05
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0x00, 0x01, 0xff, 0xb4, 0x01, 0x00, 0x21, 0x05];
        assert_eq!(decode(&bytes).unwrap(), pack!([5]));
    }

    #[test]
    fn test_symbol_value_and_sexp() {
        // (name null.string)：sexp 中一个系统符号和一个空字符串
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0xc3, 0x71, 0x04, 0x8f];
        assert_eq!(decode(&bytes).unwrap(), pack!(["name", null]));
    }

    #[test]
    fn test_float32_and_zero() {
        let mut bytes = vec![0xe0, 0x01, 0x00, 0xea, 0xb6, 0x40, 0x44];
        bytes.extend_from_slice(&2.5f32.to_be_bytes());
        assert_eq!(decode(&bytes).unwrap(), pack!([0.0, 2.5]));
    }

    #[test]
    fn test_sorted_struct() {
        // L=1 结构体：长度 0x83，字段 name(4): 1
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0xd1, 0x83, 0x84, 0x21, 0x01];
        assert_eq!(decode(&bytes).unwrap(), pack!({ "name": 1 }));
    }

    #[test]
    fn test_unsupported_types() {
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0x50];
        assert!(matches!(decode(&bytes), Err(PackError::MalformedInput(_))));
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0x62, 0x80, 0x81];
        assert!(matches!(decode(&bytes), Err(PackError::MalformedInput(_))));
    }

    #[test]
    fn test_layered_symbol_tables() {
        // 两个本地符号表依次叠加："a" 得到 10，"b" 得到 11
        let bytes = [
            0xe0, 0x01, 0x00, 0xea, //
            0xe7, 0x81, 0x83, 0xd4, 0x87, 0xb2, 0x81, b'a', //
            0xe7, 0x81, 0x83, 0xd4, 0x87, 0xb2, 0x81, b'b', //
            0xd6, 0x8a, 0x21, 0x01, 0x8b, 0x21, 0x02,
        ];
        let mut decoder = IonDecoder::new(&bytes);
        assert_eq!(decoder.decode().unwrap(), pack!({ "a": 1, "b": 2 }));
        assert_eq!(decoder.symbols().get_id("b"), Some(11));
    }

    #[test]
    fn test_unknown_symbol() {
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0xd3, 0x8a, 0x21, 0x01];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_nested_annotation_rejected() {
        let mut bytes = BVM.to_vec();
        for _ in 0..200_000 {
            bytes.extend_from_slice(&[0xee, 0xff, 0x81, 0x84]);
        }
        bytes.push(0x0f);
        assert!(matches!(decode(&bytes), Err(PackError::MalformedInput(_))));
    }

    #[test]
    fn test_annotation_counts_toward_depth() {
        // name::[5]
        let bytes = [0xe0, 0x01, 0x00, 0xea, 0xe5, 0x81, 0x84, 0xb2, 0x21, 0x05];
        assert_eq!(decode(&bytes).unwrap(), pack!([5]));

        let config = CodecConfig {
            max_nesting_depth: 1,
            ..CodecConfig::default()
        };
        let err = IonDecoder::with_config(&bytes, config).decode().unwrap_err();
        assert!(matches!(err, PackError::NestingTooDeep(1)));
    }

    #[test]
    fn test_length_beyond_input() {
        // list、struct 和注解包装各声明一个接近 usize::MAX 的长度
        for type_byte in [0xbe, 0xde, 0xee] {
            let mut bytes = BVM.to_vec();
            bytes.extend_from_slice(&[type_byte, 0x01]);
            bytes.extend_from_slice(&[0x7f; 8]);
            bytes.push(0xff);
            match decode(&bytes) {
                Err(PackError::MalformedInput(msg)) => assert!(msg.contains("incorrect length"), "{}", msg),
                other => panic!("unexpected result for 0x{:02x}: {:?}", type_byte, other),
            }
        }
    }
}
