//! UBJSON 类型标记

pub const NULL: u8 = b'Z';
pub const NOOP: u8 = b'N';
pub const TRUE: u8 = b'T';
pub const FALSE: u8 = b'F';
pub const UINT8: u8 = b'U';
pub const INT8: u8 = b'i';
pub const INT16: u8 = b'I';
pub const INT32: u8 = b'l';
pub const INT64: u8 = b'L';
pub const FLOAT32: u8 = b'd';
pub const FLOAT64: u8 = b'D';
pub const HIGH_PRECISION: u8 = b'H';
pub const CHAR: u8 = b'C';
pub const STRING: u8 = b'S';
pub const ARRAY_START: u8 = b'[';
pub const ARRAY_END: u8 = b']';
pub const OBJECT_START: u8 = b'{';
pub const OBJECT_END: u8 = b'}';
pub const CONTAINER_TYPE: u8 = b'$';
pub const CONTAINER_COUNT: u8 = b'#';
