//! UBJSON 编解码

pub mod constants;
mod decoder;
mod encoder;

pub use decoder::{decode, UbjsonDecoder};
pub use encoder::UbjsonEncoder;

use crate::codec::BinaryJsonEncoder;
use crate::value::PackValue;
use mikudb_common::PackResult;

pub fn encode(value: &PackValue) -> PackResult<Vec<u8>> {
    UbjsonEncoder::new().encode(value)
}
