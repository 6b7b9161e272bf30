//! MessagePack 编解码

pub mod constants;
mod decoder;
mod encoder;
mod shallow;

pub use decoder::{decode, validate, MsgPackDecoder};
pub use encoder::{MsgPackEncoder, MsgPackProfile};
pub use shallow::{MsgPackNavigator, PathSegment};

use crate::codec::BinaryJsonEncoder;
use crate::value::PackValue;
use mikudb_common::PackResult;

/// 使用 `full` 配置编码
pub fn encode(value: &PackValue) -> PackResult<Vec<u8>> {
    MsgPackEncoder::full().encode(value)
}

/// 使用 `stable` 配置编码，相同内容的对象输出相同字节
pub fn encode_stable(value: &PackValue) -> PackResult<Vec<u8>> {
    MsgPackEncoder::stable().encode(value)
}
