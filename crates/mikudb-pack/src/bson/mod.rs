//! BSON 编解码
//!
//! 自带的编码器和解码器直接读写字节；`interop` 负责与 `bson` crate 的值互转。

mod decoder;
mod encoder;
mod interop;
mod values;

pub use decoder::{decode, BsonDecoder};
pub use encoder::{element, BsonEncoder};
pub use interop::{from_bson, from_bson_bytes, to_bson, to_bson_bytes};
pub use values::{BsonObjectId, BsonValue};

use crate::value::PackValue;
use mikudb_common::PackResult;

/// 编码根文档
pub fn encode(value: &PackValue) -> PackResult<Vec<u8>> {
    BsonEncoder::new().encode(value)
}
