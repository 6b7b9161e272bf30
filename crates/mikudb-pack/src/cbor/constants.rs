//! CBOR 主类型与简单值

pub const MAJOR_UINT: u8 = 0;
pub const MAJOR_NINT: u8 = 1;
pub const MAJOR_BIN: u8 = 2;
pub const MAJOR_STR: u8 = 3;
pub const MAJOR_ARR: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

pub const MINOR_U8: u8 = 24;
pub const MINOR_U16: u8 = 25;
pub const MINOR_U32: u8 = 26;
pub const MINOR_U64: u8 = 27;
pub const MINOR_INDEFINITE: u8 = 31;

pub const FALSE: u8 = 0xf4;
pub const TRUE: u8 = 0xf5;
pub const NULL: u8 = 0xf6;
pub const UNDEFINED: u8 = 0xf7;
pub const FLOAT16: u8 = 0xf9;
pub const FLOAT32: u8 = 0xfa;
pub const FLOAT64: u8 = 0xfb;
pub const BREAK: u8 = 0xff;

pub const BIN_INDEFINITE: u8 = 0x5f;
pub const STR_INDEFINITE: u8 = 0x7f;
pub const ARR_INDEFINITE: u8 = 0x9f;
pub const MAP_INDEFINITE: u8 = 0xbf;

/// DAG-CBOR 内容标识符（CID）标签
pub const TAG_CID: u64 = 42;
