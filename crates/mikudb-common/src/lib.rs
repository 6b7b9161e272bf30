//! MikuDB 编解码公共模块
//!
//! - [`Writer`] / [`Reader`]: 字节缓冲区读写原语
//! - [`PackError`]: 编解码错误分类
//! - [`CodecConfig`]: 资源限制与缓冲区配置

pub mod config;
pub mod error;
pub mod reader;
pub mod writer;

pub use config::CodecConfig;
pub use error::{PackError, PackErrorKind, PackResult};
pub use reader::Reader;
pub use writer::Writer;
