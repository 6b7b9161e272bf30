//! Amazon Ion 二进制编解码

pub mod ast;
pub mod constants;
mod decoder;
mod encoder;
mod import;

pub use decoder::{decode, IonDecoder};
pub use encoder::IonEncoder;
pub use import::Import;

use crate::value::PackValue;
use mikudb_common::PackResult;

/// 使用新的符号表编码
pub fn encode(value: &PackValue) -> PackResult<Vec<u8>> {
    IonEncoder::new().encode(value)
}
