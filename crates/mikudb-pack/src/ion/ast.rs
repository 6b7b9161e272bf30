//! Ion 编码中间树
//!
//! 第一遍自底向上构建节点并确定每个节点的载荷长度，第二遍按长度写出。
//! 长度在构建时固定，之后不再变化。

use super::constants::LEN_VAR;
use super::import::Import;
use crate::codec::Depth;
use crate::value::PackValue;
use mikudb_common::{PackError, PackResult};

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Null,
    Bool(bool),
    Int { value: i64, len: usize },
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    List { items: Vec<AstNode>, len: usize },
    Struct { fields: Vec<(usize, AstNode)>, len: usize },
    Annotated {
        annotations: Vec<usize>,
        value: Box<AstNode>,
        len: usize,
    },
}

/// VarUInt 编码所需的字节数
pub fn vuint_len(n: usize) -> usize {
    let mut len = 1;
    let mut rest = n >> 7;
    while rest > 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// 无符号整数的最少字节数，0 为 0 字节
pub fn uint_len(n: u64) -> usize {
    (64 - n.leading_zeros() as usize + 7) / 8
}

impl AstNode {
    pub fn int(value: i64) -> Self {
        AstNode::Int {
            value,
            len: uint_len(value.unsigned_abs()),
        }
    }

    pub fn list(items: Vec<AstNode>) -> Self {
        let len = items.iter().map(AstNode::byte_length).sum();
        AstNode::List { items, len }
    }

    pub fn structure(fields: Vec<(usize, AstNode)>) -> Self {
        let len = fields
            .iter()
            .map(|(sid, node)| vuint_len(*sid) + node.byte_length())
            .sum();
        AstNode::Struct { fields, len }
    }

    pub fn annotated(annotations: Vec<usize>, value: AstNode) -> Self {
        let annot_len = annotations.iter().map(|id| vuint_len(*id)).sum::<usize>();
        let len = vuint_len(annot_len) + annot_len + value.byte_length();
        AstNode::Annotated {
            annotations,
            value: Box::new(value),
            len,
        }
    }

    /// 载荷长度，不含类型描述符和长度字段
    pub fn len(&self) -> usize {
        match self {
            AstNode::Null | AstNode::Bool(_) => 0,
            AstNode::Int { len, .. } => *len,
            AstNode::Float(_) => 8,
            AstNode::Str(s) => s.len(),
            AstNode::Bin(b) => b.len(),
            AstNode::List { len, .. } | AstNode::Struct { len, .. } => *len,
            AstNode::Annotated { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 类型描述符 + 长度字段 + 载荷
    pub fn byte_length(&self) -> usize {
        let len = self.len();
        if len < LEN_VAR as usize {
            1 + len
        } else {
            1 + vuint_len(len) + len
        }
    }
}

/// 第一遍：把值转换为中间树，对象键登记到符号表
pub(crate) fn to_ast(value: &PackValue, symbols: &mut Import, depth: &mut Depth) -> PackResult<AstNode> {
    let node = match value {
        PackValue::Null | PackValue::Undefined => AstNode::Null,
        PackValue::Bool(b) => AstNode::Bool(*b),
        PackValue::Int(n) => AstNode::int(*n),
        PackValue::Float(f) => AstNode::Float(*f),
        PackValue::Str(s) => AstNode::Str(s.clone()),
        PackValue::Bin(b) => AstNode::Bin(b.clone()),
        PackValue::Arr(arr) => {
            depth.enter()?;
            let items = arr
                .iter()
                .map(|item| to_ast(item, symbols, depth))
                .collect::<PackResult<Vec<_>>>()?;
            depth.leave();
            AstNode::list(items)
        }
        PackValue::Obj(obj) => {
            depth.enter()?;
            let mut fields = Vec::with_capacity(obj.len());
            for (key, value) in obj {
                let sid = symbols.add(key);
                fields.push((sid, to_ast(value, symbols, depth)?));
            }
            depth.leave();
            AstNode::structure(fields)
        }
        PackValue::Ext(_) | PackValue::Raw(_) | PackValue::Bson(_) => {
            return Err(PackError::unsupported(format!(
                "Ion cannot encode {}",
                value.type_name()
            )))
        }
    };
    Ok(node)
}
