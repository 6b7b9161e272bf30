//! Ion 二进制编码器
//!
//! 两遍编码：先用 `to_ast` 建树并确定长度，再写出。符号表在多次调用间保留，
//! 已分配的 id 保持不变；每次输出都携带完整的本地符号列表，可独立解码。

use super::ast::{to_ast, vuint_len, AstNode};
use super::constants::*;
use super::import::Import;
use crate::codec::Depth;
use crate::value::PackValue;
use mikudb_common::{CodecConfig, PackResult, Writer};

#[derive(Debug, Clone)]
pub struct IonEncoder {
    writer: Writer,
    symbols: Import,
    depth: Depth,
}

impl Default for IonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IonEncoder {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            symbols: Import::local(),
            depth: Depth::new(config.max_nesting_depth),
        }
    }

    pub fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    pub fn symbols(&self) -> &Import {
        &self.symbols
    }

    /// 丢弃本地符号，下次编码从 id 10 重新分配
    pub fn reset_symbols(&mut self) {
        self.symbols = Import::local();
    }

    pub fn encode(&mut self, value: &PackValue) -> PackResult<Vec<u8>> {
        self.writer.reset();
        self.write_any(value)?;
        Ok(self.writer.flush())
    }

    /// 写出版本标记、本地符号表和值
    pub fn write_any(&mut self, value: &PackValue) -> PackResult<()> {
        self.depth.reset();
        let ast = to_ast(value, &mut self.symbols, &mut self.depth)?;
        self.writer.buf(&BVM);
        if !self.symbols.is_empty() {
            let table = self.symbol_table();
            self.write_ast(&table);
        }
        self.write_ast(&ast);
        Ok(())
    }

    /// `$ion_symbol_table::{ symbols: [...] }`
    fn symbol_table(&self) -> AstNode {
        let symbols = self
            .symbols
            .symbols()
            .iter()
            .map(|s| AstNode::Str(s.clone()))
            .collect();
        AstNode::annotated(
            vec![SID_ION_SYMBOL_TABLE],
            AstNode::structure(vec![(SID_SYMBOLS, AstNode::list(symbols))]),
        )
    }

    fn write_type_len(&mut self, type_code: u8, len: usize) {
        if len < LEN_VAR as usize {
            self.writer.u8((type_code << 4) | len as u8);
        } else {
            self.writer.u8((type_code << 4) | LEN_VAR);
            self.write_vuint(len);
        }
    }

    /// 每字节 7 位，大端分组，最后一个字节置结束位 0x80
    fn write_vuint(&mut self, n: usize) {
        let len = vuint_len(n);
        for i in (0..len).rev() {
            let mut byte = ((n >> (7 * i)) & 0x7f) as u8;
            if i == 0 {
                byte |= 0x80;
            }
            self.writer.u8(byte);
        }
    }

    /// 第二遍：按节点已确定的长度写出
    pub fn write_ast(&mut self, node: &AstNode) {
        match node {
            AstNode::Null => self.writer.u8((TYPE_NULL << 4) | LEN_NULL),
            AstNode::Bool(b) => self.writer.u8((TYPE_BOOL << 4) | *b as u8),
            AstNode::Int { value, len } => {
                let type_code = if *value >= 0 {
                    TYPE_POS_INT
                } else {
                    TYPE_NEG_INT
                };
                self.write_type_len(type_code, *len);
                let magnitude = value.unsigned_abs().to_be_bytes();
                self.writer.buf(&magnitude[8 - *len..]);
            }
            AstNode::Float(f) => {
                self.write_type_len(TYPE_FLOAT, 8);
                self.writer.f64(*f);
            }
            AstNode::Str(s) => {
                self.write_type_len(TYPE_STRING, s.len());
                self.writer.utf8(s);
            }
            AstNode::Bin(b) => {
                self.write_type_len(TYPE_BLOB, b.len());
                self.writer.buf(b);
            }
            AstNode::List { items, len } => {
                self.write_type_len(TYPE_LIST, *len);
                for item in items {
                    self.write_ast(item);
                }
            }
            AstNode::Struct { fields, len } => {
                self.write_type_len(TYPE_STRUCT, *len);
                for (sid, child) in fields {
                    self.write_vuint(*sid);
                    self.write_ast(child);
                }
            }
            AstNode::Annotated {
                annotations,
                value,
                len,
            } => {
                self.write_type_len(TYPE_ANNOTATION, *len);
                let annot_len = annotations.iter().map(|id| vuint_len(*id)).sum();
                self.write_vuint(annot_len);
                for id in annotations {
                    self.write_vuint(*id);
                }
                self.write_ast(value);
            }
        }
    }
}
