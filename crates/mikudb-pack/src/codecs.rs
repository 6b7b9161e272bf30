//! 编解码器注册表模块
//!
//! 按 [`EncodingFormat`] 选择编解码器。[`Codecs`] 持有一个共享写入器，
//! 每次编码时把它换入所选编码器，调用结束后再换回，所有格式复用同一块缓冲区。

use crate::bson::{BsonDecoder, BsonEncoder};
use crate::cbor::{CborDecoder, CborEncoder, CborProfile};
use crate::codec::BinaryJsonEncoder;
use crate::ion::{IonDecoder, IonEncoder};
use crate::msgpack::{MsgPackDecoder, MsgPackEncoder, MsgPackProfile};
use crate::ubjson::{UbjsonDecoder, UbjsonEncoder};
use crate::value::PackValue;
use mikudb_common::{CodecConfig, PackError, PackResult, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// 支持的编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    MsgPack,
    Cbor,
    Bson,
    Ubjson,
    Ion,
}

impl EncodingFormat {
    pub const ALL: [EncodingFormat; 5] = [
        EncodingFormat::MsgPack,
        EncodingFormat::Cbor,
        EncodingFormat::Bson,
        EncodingFormat::Ubjson,
        EncodingFormat::Ion,
    ];

    /// 格式标识符
    pub fn id(&self) -> &'static str {
        match self {
            EncodingFormat::MsgPack => "msgpack",
            EncodingFormat::Cbor => "cbor",
            EncodingFormat::Bson => "bson",
            EncodingFormat::Ubjson => "ubjson",
            EncodingFormat::Ion => "ion",
        }
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EncodingFormat {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EncodingFormat::ALL
            .iter()
            .copied()
            .find(|format| format.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| PackError::Config(format!("Unknown encoding format: {}", s)))
    }
}

/// 注册表中的编解码器
///
/// `encode` 追加写入调用方提供的写入器，不清空也不取出字节。
pub trait JsonValueCodec {
    fn id(&self) -> &'static str {
        self.format().id()
    }

    fn format(&self) -> EncodingFormat;

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()>;

    fn decode(&self, data: &[u8]) -> PackResult<PackValue>;
}

/// 把共享写入器换入编码器，写完换回
fn write_swapped<E: BinaryJsonEncoder>(
    encoder: &mut E,
    writer: &mut Writer,
    value: &PackValue,
) -> PackResult<()> {
    std::mem::swap(encoder.writer(), writer);
    let result = encoder.write_root(value);
    std::mem::swap(encoder.writer(), writer);
    result
}

pub struct MsgPackCodec {
    encoder: MsgPackEncoder,
    config: CodecConfig,
}

impl MsgPackCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            encoder: MsgPackEncoder::with_config(MsgPackProfile::Full, &config),
            config,
        }
    }
}

impl JsonValueCodec for MsgPackCodec {
    fn format(&self) -> EncodingFormat {
        EncodingFormat::MsgPack
    }

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()> {
        write_swapped(&mut self.encoder, writer, value)
    }

    fn decode(&self, data: &[u8]) -> PackResult<PackValue> {
        MsgPackDecoder::with_config(data, self.config).read_any()
    }
}

pub struct CborCodec {
    encoder: CborEncoder,
    config: CodecConfig,
}

impl CborCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            encoder: CborEncoder::with_config(CborProfile::Full, &config),
            config,
        }
    }
}

impl JsonValueCodec for CborCodec {
    fn format(&self) -> EncodingFormat {
        EncodingFormat::Cbor
    }

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()> {
        write_swapped(&mut self.encoder, writer, value)
    }

    fn decode(&self, data: &[u8]) -> PackResult<PackValue> {
        CborDecoder::with_config(data, self.config).read_any()
    }
}

pub struct BsonCodec {
    encoder: BsonEncoder,
    config: CodecConfig,
}

impl BsonCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            encoder: BsonEncoder::with_config(&config),
            config,
        }
    }
}

impl JsonValueCodec for BsonCodec {
    fn format(&self) -> EncodingFormat {
        EncodingFormat::Bson
    }

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()> {
        std::mem::swap(self.encoder.writer(), writer);
        let result = self.encoder.write_any(value);
        std::mem::swap(self.encoder.writer(), writer);
        result
    }

    fn decode(&self, data: &[u8]) -> PackResult<PackValue> {
        BsonDecoder::with_config(data, self.config)
            .read_document()
            .map(PackValue::Obj)
    }
}

pub struct UbjsonCodec {
    encoder: UbjsonEncoder,
    config: CodecConfig,
}

impl UbjsonCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            encoder: UbjsonEncoder::with_config(&config),
            config,
        }
    }
}

impl JsonValueCodec for UbjsonCodec {
    fn format(&self) -> EncodingFormat {
        EncodingFormat::Ubjson
    }

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()> {
        write_swapped(&mut self.encoder, writer, value)
    }

    fn decode(&self, data: &[u8]) -> PackResult<PackValue> {
        UbjsonDecoder::with_config(data, self.config).read_any()
    }
}

/// Ion 编解码器，本地符号表在多次编码间保留
pub struct IonCodec {
    encoder: IonEncoder,
    config: CodecConfig,
}

impl IonCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            encoder: IonEncoder::with_config(&config),
            config,
        }
    }
}

impl JsonValueCodec for IonCodec {
    fn format(&self) -> EncodingFormat {
        EncodingFormat::Ion
    }

    fn encode(&mut self, writer: &mut Writer, value: &PackValue) -> PackResult<()> {
        std::mem::swap(self.encoder.writer(), writer);
        let result = self.encoder.write_any(value);
        std::mem::swap(self.encoder.writer(), writer);
        result
    }

    fn decode(&self, data: &[u8]) -> PackResult<PackValue> {
        IonDecoder::with_config(data, self.config).decode()
    }
}

/// 编解码器注册表
///
/// # 示例
///
/// ```rust
/// use mikudb_pack::{pack, Codecs, EncodingFormat};
///
/// let mut codecs = Codecs::new();
/// let value = pack!({ "id": 1, "tags": ["a"] });
/// for format in EncodingFormat::ALL {
///     let bytes = codecs.encode(format, &value).unwrap();
///     assert_eq!(codecs.decode(format, &bytes).unwrap(), value);
/// }
/// ```
pub struct Codecs {
    writer: Writer,
    msgpack: MsgPackCodec,
    cbor: CborCodec,
    bson: BsonCodec,
    ubjson: UbjsonCodec,
    ion: IonCodec,
}

impl Default for Codecs {
    fn default() -> Self {
        Self::new()
    }
}

impl Codecs {
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            writer: Writer::with_capacity(config.initial_capacity),
            msgpack: MsgPackCodec::new(config),
            cbor: CborCodec::new(config),
            bson: BsonCodec::new(config),
            ubjson: UbjsonCodec::new(config),
            ion: IonCodec::new(config),
        }
    }

    pub fn codec(&mut self, format: EncodingFormat) -> &mut dyn JsonValueCodec {
        match format {
            EncodingFormat::MsgPack => &mut self.msgpack,
            EncodingFormat::Cbor => &mut self.cbor,
            EncodingFormat::Bson => &mut self.bson,
            EncodingFormat::Ubjson => &mut self.ubjson,
            EncodingFormat::Ion => &mut self.ion,
        }
    }

    /// 用指定格式编码，返回本次写入的字节
    ///
    /// # Arguments
    /// * `format` - 目标格式
    /// * `value` - 要编码的值
    ///
    /// # Returns
    /// 成功返回编码字节；失败时共享写入器被清空，不会残留部分输出
    pub fn encode(&mut self, format: EncodingFormat, value: &PackValue) -> PackResult<Vec<u8>> {
        self.writer.reset();
        let mut writer = std::mem::take(&mut self.writer);
        let result = self.codec(format).encode(&mut writer, value);
        self.writer = writer;
        match result {
            Ok(()) => {
                let bytes = self.writer.flush();
                debug!("Encoded {} value as {}: {} bytes", value.type_name(), format, bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                self.writer.reset();
                debug!("Failed to encode {} value as {}: {}", value.type_name(), format, e);
                Err(e)
            }
        }
    }

    pub fn decode(&mut self, format: EncodingFormat, data: &[u8]) -> PackResult<PackValue> {
        let result = self.codec(format).decode(data);
        match &result {
            Ok(value) => debug!("Decoded {} bytes of {} as {}", data.len(), format, value.type_name()),
            Err(e) => debug!("Failed to decode {} bytes of {}: {}", data.len(), format, e),
        }
        result
    }
}
