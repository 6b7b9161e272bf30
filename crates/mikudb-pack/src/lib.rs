//! # mikudb-pack - 多格式二进制 JSON 编解码
//!
//! 在同一个值模型 [`PackValue`] 上实现五种二进制格式的编解码：
//!
//! - **MessagePack**：fast / full / stable 三种编码配置，支持按路径浅解码
//! - **CBOR**：含不定长容器的流式写入，以及只保留标签 42 的 DAG 模式
//! - **BSON**：文档长度回填写入，BSON 专属值见 [`BsonValue`]
//! - **UBJSON**：最窄整数标记，流式字符串/二进制回填长度
//! - **Ion**：二进制 1.0，两遍编码与本地符号表
//!
//! 另外提供编解码器注册表 [`Codecs`]、扩展 JSON 互转和 Serde 桥接。
//!
//! ## 快速开始
//!
//! ```rust
//! use mikudb_pack::{msgpack, pack, PathSegment};
//!
//! let bytes = msgpack::encode(&pack!({ "id": 123, "tags": ["a", "b", "c"] })).unwrap();
//!
//! // 完整解码
//! let value = msgpack::decode(&bytes).unwrap();
//! assert_eq!(value.get_path("tags.2").and_then(|v| v.as_str()), Some("c"));
//!
//! // 浅解码：只跳过兄弟节点，不构建整棵树
//! let mut nav = msgpack::MsgPackNavigator::new(&bytes);
//! let tag = nav.find(&["tags".into(), PathSegment::Index(1)]).unwrap().read_any().unwrap();
//! assert_eq!(tag.as_str(), Some("b"));
//! ```
//!
//! ## Serde
//!
//! ```rust
//! use mikudb_pack::{cbor, from_pack_value, to_pack_value};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Song {
//!     title: String,
//!     bpm: u32,
//! }
//!
//! let song = Song { title: "Tell Your World".into(), bpm: 130 };
//! let bytes = cbor::encode(&to_pack_value(&song).unwrap()).unwrap();
//! let back: Song = from_pack_value(&cbor::decode(&bytes).unwrap()).unwrap();
//! assert_eq!(back, song);
//! ```

pub mod value;
pub mod codec;
pub mod codecs;
pub mod msgpack;
pub mod cbor;
pub mod bson;
pub mod ubjson;
pub mod ion;
pub mod json;
pub mod ser;
pub mod de;

pub use crate::bson::{BsonObjectId, BsonValue};
pub use codec::{
    guard_key, BinaryJsonDecoder, BinaryJsonEncoder, StreamingBinaryJsonEncoder, UNSAFE_KEY,
};
pub use codecs::{Codecs, EncodingFormat, JsonValueCodec};
pub use de::from_pack_value;
pub use json::{from_json, from_json_string, to_json, to_json_string};
pub use msgpack::PathSegment;
pub use ser::to_pack_value;
pub use value::{Extension, PackMap, PackValue};

pub use mikudb_common::{CodecConfig, PackError, PackErrorKind, PackResult, Reader, Writer};
