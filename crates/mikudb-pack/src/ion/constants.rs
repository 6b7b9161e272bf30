//! Ion 二进制常量

/// 二进制版本标记 (Ion 1.0)
pub const BVM: [u8; 4] = [0xe0, 0x01, 0x00, 0xea];

pub const TYPE_NULL: u8 = 0x0;
pub const TYPE_BOOL: u8 = 0x1;
pub const TYPE_POS_INT: u8 = 0x2;
pub const TYPE_NEG_INT: u8 = 0x3;
pub const TYPE_FLOAT: u8 = 0x4;
pub const TYPE_DECIMAL: u8 = 0x5;
pub const TYPE_TIMESTAMP: u8 = 0x6;
pub const TYPE_SYMBOL: u8 = 0x7;
pub const TYPE_STRING: u8 = 0x8;
pub const TYPE_CLOB: u8 = 0x9;
pub const TYPE_BLOB: u8 = 0xa;
pub const TYPE_LIST: u8 = 0xb;
pub const TYPE_SEXP: u8 = 0xc;
pub const TYPE_STRUCT: u8 = 0xd;
pub const TYPE_ANNOTATION: u8 = 0xe;

/// 长度字段：14 表示随后跟 VarUInt 长度，15 表示 null
pub const LEN_VAR: u8 = 14;
pub const LEN_NULL: u8 = 15;

/// 系统符号表，id 从 1 开始
pub const SYSTEM_SYMBOLS: [&str; 9] = [
    "$ion",
    "$ion_1_0",
    "$ion_symbol_table",
    "name",
    "version",
    "imports",
    "symbols",
    "max_id",
    "$ion_shared_symbol_table",
];

pub const SID_ION_SYMBOL_TABLE: usize = 3;
pub const SID_SYMBOLS: usize = 7;
