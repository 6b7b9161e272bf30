//! 结构性质测试：浅解码定位、BSON 长度前缀、Ion 符号 id、危险键拒绝、恶意输入

use mikudb_pack::msgpack::{self, MsgPackNavigator};
use mikudb_pack::{
    bson, cbor, ion, pack, ubjson, PackErrorKind, PackMap, PackValue, PathSegment,
};
use mikudb_pack::ion::IonEncoder;
use mikudb_pack::{Codecs, EncodingFormat, PackResult};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = PackValue> {
    let leaf = prop_oneof![
        Just(PackValue::Null),
        any::<bool>().prop_map(PackValue::Bool),
        any::<i64>().prop_map(PackValue::Int),
        (-1.0e6f64..1.0e6).prop_map(PackValue::Float),
        "[a-z ]{0,40}".prop_map(PackValue::Str),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(PackValue::Arr),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..8)
                .prop_map(|entries| PackValue::Obj(entries.into_iter().collect::<PackMap>())),
        ]
    })
}

fn arb_document() -> impl Strategy<Value = PackValue> {
    prop::collection::vec(("[a-z]{1,6}", arb_value()), 0..8)
        .prop_map(|entries| PackValue::Obj(entries.into_iter().collect::<PackMap>()))
}

/// 收集值树中所有节点的路径
fn collect_paths(value: &PackValue, prefix: &mut Vec<PathSegment>, out: &mut Vec<Vec<PathSegment>>) {
    out.push(prefix.clone());
    match value {
        PackValue::Arr(arr) => {
            for (i, item) in arr.iter().enumerate() {
                prefix.push(PathSegment::Index(i));
                collect_paths(item, prefix, out);
                prefix.pop();
            }
        }
        PackValue::Obj(obj) => {
            for (key, item) in obj {
                prefix.push(PathSegment::Key(key.clone()));
                collect_paths(item, prefix, out);
                prefix.pop();
            }
        }
        _ => {}
    }
}

fn locate<'v>(value: &'v PackValue, path: &[PathSegment]) -> &'v PackValue {
    path.iter().fold(value, |current, segment| match (current, segment) {
        (PackValue::Arr(arr), PathSegment::Index(i)) => &arr[*i],
        (PackValue::Obj(obj), PathSegment::Key(k)) => &obj[k.as_str()],
        _ => panic!("path does not match value"),
    })
}

/// 按元素类型遍历 BSON 文档，校验每一层的长度前缀，返回文档结束位置
fn check_bson_document(bytes: &[u8], start: usize) -> usize {
    let declared = i32::from_le_bytes(bytes[start..start + 4].try_into().unwrap()) as usize;
    let mut pos = start + 4;
    loop {
        let element = bytes[pos];
        pos += 1;
        if element == 0 {
            break;
        }
        while bytes[pos] != 0 {
            pos += 1;
        }
        pos += 1;
        let read_i32 = |at: usize| i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) as usize;
        pos = match element {
            0x01 | 0x12 => pos + 8,
            0x02 => pos + 4 + read_i32(pos),
            0x03 | 0x04 => check_bson_document(bytes, pos),
            0x05 => pos + 5 + read_i32(pos),
            0x08 => pos + 1,
            0x0a => pos,
            0x10 => pos + 4,
            other => panic!("unexpected element type 0x{:02x}", other),
        };
    }
    assert_eq!(pos - start, declared);
    assert_eq!(bytes[pos - 1], 0);
    pos
}

proptest! {
    #[test]
    fn prop_shallow_equals_full(doc in arb_document()) {
        let bytes = msgpack::encode(&doc).unwrap();
        let mut paths = Vec::new();
        collect_paths(&doc, &mut Vec::new(), &mut paths);

        for path in paths {
            let target = locate(&doc, &path);
            let expected = msgpack::encode(target).unwrap();

            let mut nav = MsgPackNavigator::new(&bytes);
            let offset = nav.find(&path).unwrap().position();
            prop_assert_eq!(&bytes[offset..offset + expected.len()], expected.as_slice());
            prop_assert_eq!(&nav.read_any().unwrap(), target);
            prop_assert_eq!(nav.position(), offset + expected.len());
        }
    }

    #[test]
    fn prop_bson_nested_size_invariant(doc in arb_document()) {
        let bytes = bson::encode(&doc).unwrap();
        prop_assert_eq!(check_bson_document(&bytes, 0), bytes.len());
    }
}

#[test]
fn test_shallow_missing_path() {
    let bytes = msgpack::encode(&pack!({ "a": [1, 2] })).unwrap();
    let mut nav = MsgPackNavigator::new(&bytes);
    let err = nav.find(&["b".into()]).unwrap_err();
    assert_eq!(err.kind(), PackErrorKind::PathNotFound);

    nav.rewind();
    let err = nav.find(&["a".into(), PathSegment::Index(5)]).unwrap_err();
    assert_eq!(err.kind(), PackErrorKind::PathNotFound);
}

#[test]
fn test_ion_symbol_ids_are_stable() {
    let mut encoder = IonEncoder::new();
    encoder.encode(&pack!({ "a": 1, "b": 2 })).unwrap();
    let a_id = encoder.symbols().get_id("a");
    assert_eq!(a_id, Some(10));

    let second = pack!({ "c": { "a": true } });
    let bytes = encoder.encode(&second).unwrap();
    assert_eq!(encoder.symbols().get_id("a"), a_id);
    assert_eq!(encoder.symbols().get_id("b"), Some(11));
    assert_eq!(encoder.symbols().get_id("c"), Some(12));

    // 每次输出都携带完整的本地符号表，可以独立解码
    assert_eq!(ion::decode(&bytes).unwrap(), second);

    encoder.encode(&pack!({ "a": 0 })).unwrap();
    assert_eq!(encoder.symbols().get_id("a"), a_id);
    assert_eq!(encoder.symbols().len(), 3);
}

#[test]
fn test_unsafe_key_rejected() {
    let key = b"__proto__";

    let mut msgpack_bytes = vec![0x81, 0xa0 | key.len() as u8];
    msgpack_bytes.extend_from_slice(key);
    msgpack_bytes.push(0x01);
    let err = msgpack::decode(&msgpack_bytes).unwrap_err();
    assert_eq!(err.kind(), PackErrorKind::SecurityRejection);

    let mut ubjson_bytes = vec![b'{', b'U', key.len() as u8];
    ubjson_bytes.extend_from_slice(key);
    ubjson_bytes.extend_from_slice(&[b'U', 1, b'}']);
    let err = ubjson::decode(&ubjson_bytes).unwrap_err();
    assert_eq!(err.kind(), PackErrorKind::SecurityRejection);

    let mut cbor_bytes = vec![0xa1, 0x60 | key.len() as u8];
    cbor_bytes.extend_from_slice(key);
    cbor_bytes.push(0x01);
    let err = cbor::decode(&cbor_bytes).unwrap_err();
    assert_eq!(err.kind(), PackErrorKind::SecurityRejection);
}

#[test]
fn test_unsafe_key_in_nested_object() {
    let mut inner = PackMap::new();
    inner.insert("__proto__".to_string(), PackValue::Int(1));
    let value = pack!({ "ok": (PackValue::Obj(inner)) });
    let bytes = msgpack::encode(&value).unwrap();
    assert_eq!(
        msgpack::decode(&bytes).unwrap_err().kind(),
        PackErrorKind::SecurityRejection
    );
}

/// 远超默认嵌套上限的层数
const DEEP: usize = 100_000;

fn repeated(unit: &[u8], times: usize, tail: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(unit.len() * times + tail.len());
    for _ in 0..times {
        bytes.extend_from_slice(unit);
    }
    bytes.extend_from_slice(tail);
    bytes
}

fn assert_malformed<T: std::fmt::Debug>(result: PackResult<T>, what: &str) {
    match result {
        Err(err) => assert_eq!(err.kind(), PackErrorKind::MalformedInput, "{}: {}", what, err),
        Ok(value) => panic!("{}: decoded {:?}", what, value),
    }
}

/// `depth` 层嵌套文档，每层键为 `key`，元素类型为 `element`
fn nested_bson(depth: usize, element: u8, key: u8) -> Vec<u8> {
    let mut lengths = vec![5i32];
    for i in 0..depth {
        lengths.push(lengths[i] + 8);
    }
    let mut bytes = Vec::new();
    for len in lengths[1..].iter().rev() {
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&[element, key, 0]);
    }
    bytes.extend_from_slice(&[5, 0, 0, 0, 0]);
    bytes.extend(std::iter::repeat(0).take(depth));
    bytes
}

#[test]
fn test_deep_nesting_msgpack() {
    let cases = [
        ("array", repeated(&[0x91], DEEP, &[0xc0])),
        ("map value", repeated(&[0x81, 0xa1, b'a'], DEEP, &[0xc0])),
        ("map key", repeated(&[0x81], DEEP, &[0xc0, 0xc0])),
        ("array16", repeated(&[0xdc, 0x00, 0x01], DEEP, &[0xc0])),
    ];
    for (what, bytes) in &cases {
        assert_malformed(msgpack::decode(bytes), what);
        assert_malformed(msgpack::validate(bytes), what);
        assert_malformed(MsgPackNavigator::new(bytes).skip_any(), what);
    }
}

#[test]
fn test_deep_nesting_cbor() {
    let cases = [
        ("array", repeated(&[0x81], DEEP, &[0xf6])),
        ("indefinite array", repeated(&[0x9f], DEEP, &[0xf6])),
        ("map value", repeated(&[0xa1, 0x61, b'a'], DEEP, &[0xf6])),
        ("map key", repeated(&[0xa1], DEEP, &[0xf6, 0xf6])),
        ("tag", repeated(&[0xc1], DEEP, &[0xf6])),
        ("tag 42", repeated(&[0xd8, 0x2a], DEEP, &[0xf6])),
    ];
    for (what, bytes) in &cases {
        assert_malformed(cbor::decode(bytes), what);
        assert_malformed(cbor::decode_dag(bytes), what);
        assert_malformed(cbor::validate(bytes), what);
    }
}

#[test]
fn test_deep_nesting_bson() {
    let depth = 1_000;
    assert_malformed(bson::decode(&nested_bson(depth, 0x03, b'a')), "document");
    assert_malformed(bson::decode(&nested_bson(depth, 0x04, b'0')), "array");
    // 限制以内的嵌套正常解码
    assert!(bson::decode(&nested_bson(10, 0x03, b'a')).is_ok());
}

#[test]
fn test_deep_nesting_ubjson() {
    let cases = [
        ("array", repeated(b"[", DEEP, b"Z")),
        ("object", repeated(&[b'{', b'U', 1, b'a'], DEEP, b"Z")),
        ("counted array", repeated(&[b'[', b'#', b'U', 1], DEEP, b"Z")),
        ("typed array", repeated(&[b'[', b'$', b'[', b'#', b'U', 1], DEEP, b"Z")),
        ("noop padded", repeated(b"[N", DEEP, b"Z")),
    ];
    for (what, bytes) in &cases {
        assert_malformed(ubjson::decode(bytes), what);
    }
}

#[test]
fn test_deep_nesting_ion() {
    let bvm = [0xe0, 0x01, 0x00, 0xea];
    let cases = [
        ("list", repeated(&[0xb1], DEEP, &[0x0f])),
        ("sexp", repeated(&[0xc1], DEEP, &[0x0f])),
        ("struct", repeated(&[0xd2, 0x84], DEEP, &[0x0f])),
        ("annotated list", repeated(&[0xe3, 0x81, 0x84, 0xb1], DEEP, &[0x0f])),
        ("nested annotation", repeated(&[0xee, 0xff, 0x81, 0x84], DEEP, &[0x0f])),
    ];
    for (what, body) in &cases {
        let mut bytes = bvm.to_vec();
        bytes.extend_from_slice(body);
        assert_malformed(ion::decode(&bytes), what);
    }
}

#[test]
fn test_lengths_beyond_input() {
    // MessagePack: str32 / bin32 / ext32 声明 1 MiB，实际只有 1 字节；array32 / map32 个数过大
    assert_malformed(msgpack::decode(&[0xdb, 0x00, 0x10, 0x00, 0x00, b'a']), "msgpack str32");
    assert_malformed(msgpack::decode(&[0xc6, 0x00, 0x10, 0x00, 0x00, 0x01]), "msgpack bin32");
    assert_malformed(msgpack::decode(&[0xc9, 0x00, 0x10, 0x00, 0x00, 0x01, 0x02]), "msgpack ext32");
    assert_malformed(msgpack::decode(&[0xdd, 0xff, 0xff, 0xff, 0xff, 0xc0]), "msgpack array32");
    assert_malformed(msgpack::decode(&[0xdf, 0x00, 0x00, 0x10, 0x00, 0xa1, b'a', 0xc0]), "msgpack map32");
    assert_malformed(msgpack::validate(&[0xdb, 0xff, 0xff, 0xff, 0xff]), "msgpack skip str32");

    // CBOR: 64 位长度、不定长字符串分块长度、数组个数
    let mut huge = vec![0x7b];
    huge.extend_from_slice(&u64::MAX.to_be_bytes());
    assert_malformed(cbor::decode(&huge), "cbor text u64 length");
    assert_malformed(cbor::validate(&huge), "cbor skip text u64 length");
    let mut chunked = vec![0x5f, 0x41, 0x00, 0x5b];
    chunked.extend_from_slice(&u64::MAX.to_be_bytes());
    assert_malformed(cbor::decode(&chunked), "cbor byte chunk u64 length");
    assert_malformed(cbor::decode(&[0x5a, 0x00, 0x01, 0x00, 0x00, 0x01]), "cbor bytes u32 length");
    let mut items = vec![0x9b];
    items.extend_from_slice(&u64::MAX.to_be_bytes());
    assert_malformed(cbor::decode(&items), "cbor array u64 count");

    // BSON: 文档长度大于输入、字符串长度过大、负长度
    assert_malformed(
        bson::decode(&[100, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]),
        "bson document length",
    );
    assert_malformed(
        bson::decode(&[16, 0, 0, 0, 0x02, b'a', 0, 0xff, 0xff, 0xff, 0x7f, b'x', 0, 0]),
        "bson string length",
    );
    assert_malformed(
        bson::decode(&[16, 0, 0, 0, 0x05, b'a', 0, 0x00, 0x00, 0x10, 0x00, 0x00, 1, 0]),
        "bson binary length",
    );
    assert_malformed(bson::decode(&[0xff, 0xff, 0xff, 0xff, 0]), "bson negative length");

    // UBJSON: 字符串长度、计数容器个数、负长度
    assert_malformed(ubjson::decode(&[b'S', b'l', 0x00, 0x10, 0x00, 0x00, b'a']), "ubjson string");
    let mut long = vec![b'S', b'L'];
    long.extend_from_slice(&i64::MAX.to_be_bytes());
    assert_malformed(ubjson::decode(&long), "ubjson i64 string length");
    let mut count = vec![b'[', b'#', b'L'];
    count.extend_from_slice(&i64::MAX.to_be_bytes());
    assert_malformed(ubjson::decode(&count), "ubjson container count");
    assert_malformed(ubjson::decode(&[b'[', b'$', b'U', b'#', b'I', 0x10, 0x00, 1]), "ubjson binary");
    assert_malformed(ubjson::decode(&[b'S', b'i', 0xff]), "ubjson negative length");

    // Ion: 字符串、列表、结构体、注解包装的长度接近 usize::MAX
    for type_byte in [0x8e, 0xae, 0xbe, 0xde, 0xee] {
        let mut bytes = vec![0xe0, 0x01, 0x00, 0xea, type_byte, 0x01];
        bytes.extend_from_slice(&[0x7f; 8]);
        bytes.push(0xff);
        assert_malformed(ion::decode(&bytes), &format!("ion 0x{:02x}", type_byte));
    }
}

proptest! {
    #[test]
    fn prop_truncated_input_is_malformed(doc in arb_document(), cut in any::<prop::sample::Index>()) {
        let mut codecs = Codecs::new();
        for format in EncodingFormat::ALL {
            let bytes = codecs.encode(format, &doc).unwrap();
            let end = cut.index(bytes.len());
            let err = codecs.decode(format, &bytes[..end]).unwrap_err();
            prop_assert_eq!(err.kind(), PackErrorKind::MalformedInput, "{} cut at {}", format, end);
        }
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = msgpack::decode(&bytes);
        let _ = msgpack::validate(&bytes);
        let _ = MsgPackNavigator::new(&bytes).find(&["a".into(), PathSegment::Index(0)]);
        let _ = cbor::decode(&bytes);
        let _ = cbor::decode_dag(&bytes);
        let _ = cbor::validate(&bytes);
        let _ = bson::decode(&bytes);
        let _ = ubjson::decode(&bytes);
        let _ = ion::decode(&bytes);
    }
}
