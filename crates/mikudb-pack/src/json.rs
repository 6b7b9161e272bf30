//! PackValue 与 JSON 互转模块
//!
//! JSON 只有 null、布尔、数字、字符串、数组、对象六种类型，其余值使用
//! MongoDB 风格的扩展 JSON 表示，转换回来时按单个 `$` 键识别。

use crate::bson::{BsonObjectId, BsonValue};
use crate::value::{Extension, PackMap, PackValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::TimeZone;
use mikudb_common::{PackError, PackResult};
use serde_json::{json, Map, Number, Value as JsonValue};

/// 将 PackValue 转换为 JSON
///
/// # Brief
/// 将值转换为 JSON 值，非 JSON 类型使用扩展 JSON 格式
///
/// # 扩展 JSON 格式
/// - Undefined: `{"$undefined": true}`
/// - 非有限浮点数: `{"$numberDouble": "NaN"}`
/// - Binary: `{"$binary": "base64_string"}`
/// - Extension: `{"$ext": {"tag": 1, "value": ...}}`
/// - Raw: `{"$raw": "base64_string"}`
/// - ObjectId: `{"$oid": "507f1f77bcf86cd799439011"}`
/// - DateTime: `{"$date": 1234567890000}`
/// - Regex: `{"$regex": "pattern", "$options": "i"}`
/// - JavaScript with Scope: `{"$code": "...", "$scope": {...}}`
/// - BSON 定宽数值: `{"$numberInt": "1"}`、`{"$numberLong": "1"}`
///
/// # Arguments
/// * `value` - 要转换的值
///
/// # Returns
/// 成功返回 JSON 值，失败返回错误
pub fn to_json(value: &PackValue) -> PackResult<JsonValue> {
    match value {
        PackValue::Null => Ok(JsonValue::Null),
        PackValue::Undefined => Ok(json!({"$undefined": true})),
        PackValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        PackValue::Int(n) => Ok(json!(*n)),
        PackValue::Float(f) => match Number::from_f64(*f) {
            Some(n) => Ok(JsonValue::Number(n)),
            None => Ok(json!({"$numberDouble": f.to_string()})),
        },
        PackValue::Str(s) => Ok(JsonValue::String(s.clone())),
        PackValue::Bin(b) => Ok(json!({"$binary": STANDARD.encode(b)})),
        PackValue::Arr(arr) => {
            let json_arr: Result<Vec<_>, _> = arr.iter().map(to_json).collect();
            Ok(JsonValue::Array(json_arr?))
        }
        PackValue::Obj(obj) => object_to_json(obj),
        PackValue::Ext(ext) => Ok(json!({
            "$ext": {
                "tag": ext.tag,
                "value": to_json(&ext.value)?
            }
        })),
        PackValue::Raw(b) => Ok(json!({"$raw": STANDARD.encode(b)})),
        PackValue::Bson(b) => bson_to_json(b),
    }
}

fn object_to_json(obj: &PackMap) -> PackResult<JsonValue> {
    let mut json_obj = Map::new();
    for (k, v) in obj {
        json_obj.insert(k.clone(), to_json(v)?);
    }
    Ok(JsonValue::Object(json_obj))
}

fn bson_to_json(value: &BsonValue) -> PackResult<JsonValue> {
    let json_value = match value {
        BsonValue::ObjectId(oid) => json!({"$oid": oid.to_hex()}),
        BsonValue::DateTime(dt) => json!({"$date": dt.timestamp_millis()}),
        BsonValue::Regex { pattern, flags } => json!({
            "$regex": pattern,
            "$options": flags
        }),
        BsonValue::DbPointer { name, id } => json!({
            "$dbPointer": {
                "$ref": name,
                "$id": {"$oid": id.to_hex()}
            }
        }),
        BsonValue::JavascriptCode(code) => json!({"$code": code}),
        BsonValue::Symbol(s) => json!({"$symbol": s}),
        BsonValue::JavascriptCodeWithScope { code, scope } => json!({
            "$code": code,
            "$scope": object_to_json(scope)?
        }),
        BsonValue::Int32(n) => json!({"$numberInt": n.to_string()}),
        BsonValue::Int64(n) => json!({"$numberLong": n.to_string()}),
        BsonValue::Float(f) => json!({"$numberDouble": f.to_string()}),
        BsonValue::Timestamp {
            increment,
            timestamp,
        } => json!({"$timestamp": {"t": timestamp, "i": increment}}),
        // 不做十进制文本转换，保留原始 16 字节
        BsonValue::Decimal128(bytes) => json!({"$numberDecimal": hex::encode(bytes)}),
        BsonValue::MinKey => json!({"$minKey": 1}),
        BsonValue::MaxKey => json!({"$maxKey": 1}),
        BsonValue::Binary { subtype, data } => json!({
            "$binary": {
                "base64": STANDARD.encode(data),
                "subType": format!("{:02x}", subtype)
            }
        }),
    };
    Ok(json_value)
}

/// 从 JSON 转换为 PackValue
///
/// # Brief
/// 将 JSON 值转换为 PackValue，识别扩展 JSON 格式。
/// 形状不匹配的 `$` 对象按普通对象处理。
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 成功返回 PackValue，扩展 JSON 内容无效时返回 `PackError::Deserialization`
pub fn from_json(value: &JsonValue) -> PackResult<PackValue> {
    match value {
        JsonValue::Null => Ok(PackValue::Null),
        JsonValue::Bool(b) => Ok(PackValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(PackValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(PackValue::Float(f))
            } else {
                Err(PackError::Deserialization("Invalid number".to_string()))
            }
        }
        JsonValue::String(s) => Ok(PackValue::Str(s.clone())),
        JsonValue::Array(arr) => {
            let pack_arr: Result<Vec<_>, _> = arr.iter().map(from_json).collect();
            Ok(PackValue::Arr(pack_arr?))
        }
        JsonValue::Object(obj) => {
            if let Some(value) = from_extended(obj)? {
                return Ok(value);
            }
            let mut pack_obj = PackMap::with_capacity(obj.len());
            for (k, v) in obj {
                pack_obj.insert(k.clone(), from_json(v)?);
            }
            Ok(PackValue::Obj(pack_obj))
        }
    }
}

fn invalid(what: &str) -> PackError {
    PackError::Deserialization(format!("Invalid {}", what))
}

fn decode_base64(s: &str) -> PackResult<Vec<u8>> {
    STANDARD.decode(s).map_err(|_| invalid("base64"))
}

fn parse_double(s: &str) -> PackResult<f64> {
    match s {
        "NaN" => Ok(f64::NAN),
        "Infinity" | "inf" => Ok(f64::INFINITY),
        "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
        _ => s.parse().map_err(|_| invalid("$numberDouble")),
    }
}

fn parse_oid(value: &JsonValue) -> Option<PackResult<BsonObjectId>> {
    value.as_str().map(BsonObjectId::from_hex)
}

/// 识别扩展 JSON，普通对象返回 `None`
fn from_extended(obj: &Map<String, JsonValue>) -> PackResult<Option<PackValue>> {
    let first = match obj.keys().next() {
        Some(k) if k.starts_with('$') => k.as_str(),
        _ => return Ok(None),
    };

    if obj.len() == 2 {
        if let (Some(JsonValue::String(pattern)), Some(JsonValue::String(flags))) =
            (obj.get("$regex"), obj.get("$options"))
        {
            return Ok(Some(BsonValue::regex(pattern.clone(), flags).into()));
        }
        if let (Some(JsonValue::String(code)), Some(JsonValue::Object(scope))) =
            (obj.get("$code"), obj.get("$scope"))
        {
            let mut scope_map = PackMap::with_capacity(scope.len());
            for (k, v) in scope {
                scope_map.insert(k.clone(), from_json(v)?);
            }
            return Ok(Some(
                BsonValue::JavascriptCodeWithScope {
                    code: code.clone(),
                    scope: scope_map,
                }
                .into(),
            ));
        }
        return Ok(None);
    }
    if obj.len() != 1 {
        return Ok(None);
    }

    let inner = &obj[first];
    let value: PackValue = match (first, inner) {
        ("$undefined", JsonValue::Bool(true)) => PackValue::Undefined,
        ("$binary", JsonValue::String(s)) => PackValue::Bin(decode_base64(s)?),
        ("$binary", JsonValue::Object(bin)) => {
            let data = bin
                .get("base64")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid("$binary"))?;
            let subtype = bin
                .get("subType")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid("$binary"))?;
            let subtype = u8::from_str_radix(subtype, 16).map_err(|_| invalid("$binary subType"))?;
            BsonValue::Binary {
                subtype,
                data: decode_base64(data)?,
            }
            .into()
        }
        ("$raw", JsonValue::String(s)) => PackValue::Raw(decode_base64(s)?),
        ("$ext", JsonValue::Object(ext)) => {
            let tag = ext
                .get("tag")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| invalid("$ext tag"))?;
            let value = ext.get("value").ok_or_else(|| invalid("$ext value"))?;
            PackValue::Ext(Extension::new(tag, from_json(value)?))
        }
        ("$oid", JsonValue::String(s)) => BsonValue::ObjectId(BsonObjectId::from_hex(s)?).into(),
        ("$date", JsonValue::Number(n)) => {
            let millis = n.as_i64().ok_or_else(|| invalid("$date"))?;
            let dt = chrono::Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| invalid("datetime"))?;
            BsonValue::DateTime(dt).into()
        }
        ("$dbPointer", JsonValue::Object(ptr)) => {
            let name = ptr
                .get("$ref")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid("$dbPointer"))?;
            let id = ptr
                .get("$id")
                .and_then(|v| v.get("$oid"))
                .and_then(parse_oid)
                .ok_or_else(|| invalid("$dbPointer"))??;
            BsonValue::DbPointer {
                name: name.to_string(),
                id,
            }
            .into()
        }
        ("$code", JsonValue::String(s)) => BsonValue::JavascriptCode(s.clone()).into(),
        ("$symbol", JsonValue::String(s)) => BsonValue::Symbol(s.clone()).into(),
        ("$numberInt", JsonValue::String(s)) => {
            BsonValue::Int32(s.parse().map_err(|_| invalid("$numberInt"))?).into()
        }
        ("$numberLong", JsonValue::String(s)) => {
            BsonValue::Int64(s.parse().map_err(|_| invalid("$numberLong"))?).into()
        }
        ("$numberDouble", JsonValue::String(s)) => PackValue::Float(parse_double(s)?),
        ("$timestamp", JsonValue::Object(ts)) => {
            let field = |name: &str| {
                ts.get(name)
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| invalid("$timestamp"))
            };
            BsonValue::Timestamp {
                increment: field("i")?,
                timestamp: field("t")?,
            }
            .into()
        }
        ("$numberDecimal", JsonValue::String(s)) => {
            let mut bytes = [0u8; 16];
            hex::decode_to_slice(s, &mut bytes).map_err(|_| invalid("$numberDecimal"))?;
            BsonValue::Decimal128(bytes).into()
        }
        ("$minKey", JsonValue::Number(_)) => BsonValue::MinKey.into(),
        ("$maxKey", JsonValue::Number(_)) => BsonValue::MaxKey.into(),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// 将 PackValue 序列化为 JSON 字符串
///
/// # Brief
/// 将值转换为美化的 JSON 字符串
///
/// # Arguments
/// * `value` - 要序列化的值
///
/// # Returns
/// 成功返回 JSON 字符串，失败返回错误
pub fn to_json_string(value: &PackValue) -> PackResult<String> {
    let json_value = to_json(value)?;
    serde_json::to_string_pretty(&json_value)
        .map_err(|e| PackError::Serialization(format!("JSON serialization failed: {}", e)))
}

/// 从 JSON 字符串反序列化为 PackValue
///
/// # Arguments
/// * `json_str` - JSON 字符串
///
/// # Returns
/// 成功返回 PackValue，失败返回错误
pub fn from_json_string(json_str: &str) -> PackResult<PackValue> {
    let json_value: JsonValue = serde_json::from_str(json_str)
        .map_err(|e| PackError::Deserialization(format!("JSON parsing failed: {}", e)))?;
    from_json(&json_value)
}
