//! PackValue 与 `bson` crate 互转
//!
//! 用于和 MongoDB 生态交换数据，以及在测试中用独立实现交叉校验编码结果。

use super::values::{BsonObjectId, BsonValue};
use crate::value::{PackMap, PackValue};
use bson::spec::BinarySubtype;
use bson::{Bson, Document as BsonDocument};
use chrono::TimeZone;
use mikudb_common::{PackError, PackResult};

/// 将 PackValue 转换为 BSON
///
/// # 类型映射
/// - Int → Int32（在 i32 范围内）或 Int64
/// - Float → Double
/// - Bin → Binary（Generic 子类型）
/// - Undefined → Undefined
/// - Bson(..) → 对应的 BSON 特殊类型
///
/// `Ext`、`Raw` 和 `DbPointer` 没有可构造的对应类型，返回 `UnsupportedValue`。
pub fn to_bson(value: &PackValue) -> PackResult<Bson> {
    match value {
        PackValue::Null => Ok(Bson::Null),
        PackValue::Undefined => Ok(Bson::Undefined),
        PackValue::Bool(b) => Ok(Bson::Boolean(*b)),
        PackValue::Int(n) => Ok(match i32::try_from(*n) {
            Ok(n) => Bson::Int32(n),
            Err(_) => Bson::Int64(*n),
        }),
        PackValue::Float(f) => Ok(Bson::Double(*f)),
        PackValue::Str(s) => Ok(Bson::String(s.clone())),
        PackValue::Bin(b) => Ok(Bson::Binary(bson::Binary {
            subtype: BinarySubtype::Generic,
            bytes: b.clone(),
        })),
        PackValue::Arr(arr) => {
            let bson_arr: Result<Vec<_>, _> = arr.iter().map(to_bson).collect();
            Ok(Bson::Array(bson_arr?))
        }
        PackValue::Obj(obj) => Ok(Bson::Document(to_bson_document(obj)?)),
        PackValue::Bson(special) => special_to_bson(special),
        PackValue::Ext(_) | PackValue::Raw(_) => Err(PackError::unsupported(format!(
            "{} has no BSON equivalent",
            value.type_name()
        ))),
    }
}

fn to_bson_document(obj: &PackMap) -> PackResult<BsonDocument> {
    let mut doc = BsonDocument::new();
    for (k, v) in obj {
        doc.insert(k.clone(), to_bson(v)?);
    }
    Ok(doc)
}

fn special_to_bson(value: &BsonValue) -> PackResult<Bson> {
    match value {
        BsonValue::ObjectId(id) => Ok(Bson::ObjectId(bson::oid::ObjectId::from_bytes(
            id.to_bytes(),
        ))),
        BsonValue::DateTime(dt) => Ok(Bson::DateTime(bson::DateTime::from_millis(
            dt.timestamp_millis(),
        ))),
        BsonValue::Regex { pattern, flags } => Ok(Bson::RegularExpression(bson::Regex {
            pattern: pattern.clone(),
            options: flags.clone(),
        })),
        BsonValue::DbPointer { .. } => Err(PackError::unsupported(
            "DbPointer cannot be converted to a bson crate value",
        )),
        BsonValue::JavascriptCode(code) => Ok(Bson::JavaScriptCode(code.clone())),
        BsonValue::Symbol(s) => Ok(Bson::Symbol(s.clone())),
        BsonValue::JavascriptCodeWithScope { code, scope } => Ok(Bson::JavaScriptCodeWithScope(
            bson::JavaScriptCodeWithScope {
                code: code.clone(),
                scope: to_bson_document(scope)?,
            },
        )),
        BsonValue::Int32(n) => Ok(Bson::Int32(*n)),
        BsonValue::Int64(n) => Ok(Bson::Int64(*n)),
        BsonValue::Float(f) => Ok(Bson::Double(*f)),
        BsonValue::Timestamp {
            increment,
            timestamp,
        } => Ok(Bson::Timestamp(bson::Timestamp {
            time: *timestamp,
            increment: *increment,
        })),
        BsonValue::Decimal128(bytes) => Ok(Bson::Decimal128(bson::Decimal128::from_bytes(*bytes))),
        BsonValue::MinKey => Ok(Bson::MinKey),
        BsonValue::MaxKey => Ok(Bson::MaxKey),
        BsonValue::Binary { subtype, data } => Ok(Bson::Binary(bson::Binary {
            subtype: BinarySubtype::from(*subtype),
            bytes: data.clone(),
        })),
    }
}

/// 从 BSON 转换为 PackValue
///
/// 整数统一转为 `Int`，Generic 子类型的二进制转为 `Bin`，其余特殊类型保留为
/// `PackValue::Bson`。
pub fn from_bson(bson: &Bson) -> PackResult<PackValue> {
    match bson {
        Bson::Null => Ok(PackValue::Null),
        Bson::Undefined => Ok(PackValue::Undefined),
        Bson::Boolean(b) => Ok(PackValue::Bool(*b)),
        Bson::Int32(n) => Ok(PackValue::Int(*n as i64)),
        Bson::Int64(n) => Ok(PackValue::Int(*n)),
        Bson::Double(f) => Ok(PackValue::Float(*f)),
        Bson::String(s) => Ok(PackValue::Str(s.clone())),
        Bson::Binary(b) => Ok(match b.subtype {
            BinarySubtype::Generic => PackValue::Bin(b.bytes.clone()),
            subtype => PackValue::Bson(BsonValue::Binary {
                subtype: u8::from(subtype),
                data: b.bytes.clone(),
            }),
        }),
        Bson::Array(arr) => {
            let pack_arr: Result<Vec<_>, _> = arr.iter().map(from_bson).collect();
            Ok(PackValue::Arr(pack_arr?))
        }
        Bson::Document(doc) => Ok(PackValue::Obj(from_bson_document(doc)?)),
        Bson::ObjectId(oid) => Ok(BsonValue::ObjectId(BsonObjectId::from_bytes(oid.bytes())).into()),
        Bson::DateTime(dt) => {
            let millis = dt.timestamp_millis();
            let chrono_dt = chrono::Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| PackError::Deserialization(format!("Invalid datetime: {}", millis)))?;
            Ok(BsonValue::DateTime(chrono_dt).into())
        }
        Bson::RegularExpression(regex) => Ok(BsonValue::Regex {
            pattern: regex.pattern.clone(),
            flags: regex.options.clone(),
        }
        .into()),
        Bson::JavaScriptCode(code) => Ok(BsonValue::JavascriptCode(code.clone()).into()),
        Bson::JavaScriptCodeWithScope(js) => Ok(BsonValue::JavascriptCodeWithScope {
            code: js.code.clone(),
            scope: from_bson_document(&js.scope)?,
        }
        .into()),
        Bson::Timestamp(ts) => Ok(BsonValue::Timestamp {
            increment: ts.increment,
            timestamp: ts.time,
        }
        .into()),
        Bson::Symbol(s) => Ok(BsonValue::Symbol(s.clone()).into()),
        Bson::Decimal128(d) => Ok(BsonValue::Decimal128(d.bytes()).into()),
        Bson::MaxKey => Ok(BsonValue::MaxKey.into()),
        Bson::MinKey => Ok(BsonValue::MinKey.into()),
        Bson::DbPointer(_) => Err(PackError::Deserialization(
            "DbPointer is not readable through the bson crate".to_string(),
        )),
    }
}

fn from_bson_document(doc: &BsonDocument) -> PackResult<PackMap> {
    let mut obj = PackMap::with_capacity(doc.len());
    for (k, v) in doc {
        obj.insert(k.clone(), from_bson(v)?);
    }
    Ok(obj)
}

/// 通过 `bson` crate 序列化，值必须是对象
pub fn to_bson_bytes(value: &PackValue) -> PackResult<Vec<u8>> {
    match to_bson(value)? {
        Bson::Document(doc) => {
            let mut bytes = Vec::new();
            doc.to_writer(&mut bytes).map_err(|e| {
                PackError::Serialization(format!("BSON serialization failed: {}", e))
            })?;
            Ok(bytes)
        }
        _ => Err(PackError::Serialization(
            "Only documents can be serialized to BSON bytes".to_string(),
        )),
    }
}

/// 通过 `bson` crate 反序列化
pub fn from_bson_bytes(bytes: &[u8]) -> PackResult<PackValue> {
    let doc = BsonDocument::from_reader(&mut &bytes[..]).map_err(|e| {
        PackError::Deserialization(format!("BSON deserialization failed: {}", e))
    })?;
    from_bson(&Bson::Document(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::{decode, BsonEncoder};
    use crate::pack;

    #[test]
    fn test_basic_types() {
        for value in [pack!(null), pack!(true), pack!(42), pack!(1.5), pack!("s")] {
            assert_eq!(from_bson(&to_bson(&value).unwrap()).unwrap(), value);
        }
    }

    #[test]
    fn test_our_bytes_match_bson_crate() {
        let id = BsonObjectId::from_hex("507f1f77bcf86cd799439011").unwrap();
        let value = pack!({
            "name": "Bob",
            "age": 25,
            "tags": ["a", "b"],
            "id": (BsonValue::ObjectId(id)),
            "ts": (BsonValue::Timestamp { increment: 1, timestamp: 2 })
        });
        let ours = BsonEncoder::new().encode(&value).unwrap();
        let theirs = to_bson_bytes(&value).unwrap();
        assert_eq!(ours, theirs);
        assert_eq!(decode(&theirs).unwrap(), value);
        assert_eq!(from_bson_bytes(&ours).unwrap(), value);
    }

    #[test]
    fn test_binary_subtypes() {
        let uuid = PackValue::Bson(BsonValue::Binary {
            subtype: 4,
            data: vec![7; 16],
        });
        assert_eq!(from_bson(&to_bson(&uuid).unwrap()).unwrap(), uuid);
    }

    #[test]
    fn test_unsupported() {
        assert!(to_bson(&PackValue::Raw(vec![])).is_err());
        assert!(to_bson_bytes(&pack!([1])).is_err());
    }
}
