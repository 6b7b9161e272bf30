//! CBOR 编解码（含 DAG-CBOR 变体）

pub mod constants;
mod decoder;
mod encoder;

pub use decoder::{decode, decode_dag, decode_f16, validate, CborDecoder};
pub use encoder::{canonical_key_order, CborEncoder, CborProfile};

use crate::codec::BinaryJsonEncoder;
use crate::value::PackValue;
use mikudb_common::PackResult;

pub fn encode(value: &PackValue) -> PackResult<Vec<u8>> {
    CborEncoder::full().encode(value)
}

pub fn encode_stable(value: &PackValue) -> PackResult<Vec<u8>> {
    CborEncoder::stable().encode(value)
}

pub fn encode_dag(value: &PackValue) -> PackResult<Vec<u8>> {
    CborEncoder::dag().encode(value)
}
