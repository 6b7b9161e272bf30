//! 随机值树在每种格式上的往返测试
//!
//! 浮点数只生成有限值（NaN 不等于自身）；Undefined 只在 MessagePack 与 CBOR
//! 中保留，其他格式会写成 null，因此只给这两种格式生成。

use mikudb_pack::{bson, cbor, ion, msgpack, ubjson, Codecs, EncodingFormat, PackMap, PackValue};
use proptest::prelude::*;

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}"
}

fn arb_leaf(with_undefined: bool) -> BoxedStrategy<PackValue> {
    let base = prop_oneof![
        Just(PackValue::Null),
        any::<bool>().prop_map(PackValue::Bool),
        any::<i64>().prop_map(PackValue::Int),
        (-300i64..70_000).prop_map(PackValue::Int),
        (prop::num::f64::NORMAL | prop::num::f64::ZERO).prop_map(PackValue::Float),
        "\\PC{0,24}".prop_map(PackValue::Str),
        prop::collection::vec(any::<u8>(), 0..40).prop_map(PackValue::Bin),
    ];
    if with_undefined {
        prop_oneof![9 => base, 1 => Just(PackValue::Undefined)].boxed()
    } else {
        base.boxed()
    }
}

fn arb_value(with_undefined: bool) -> impl Strategy<Value = PackValue> {
    arb_leaf(with_undefined).prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(PackValue::Arr),
            prop::collection::vec((arb_key(), inner), 0..6)
                .prop_map(|entries| PackValue::Obj(entries.into_iter().collect::<PackMap>())),
        ]
    })
}

fn arb_document() -> impl Strategy<Value = PackValue> {
    prop::collection::vec((arb_key(), arb_value(false)), 0..6)
        .prop_map(|entries| PackValue::Obj(entries.into_iter().collect::<PackMap>()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn prop_msgpack_roundtrip(value in arb_value(true)) {
        let bytes = msgpack::encode(&value).unwrap();
        prop_assert_eq!(msgpack::decode(&bytes).unwrap(), value.clone());
        prop_assert!(msgpack::validate(&bytes).is_ok());

        // stable 输出与键顺序无关
        let stable = msgpack::encode_stable(&value).unwrap();
        prop_assert_eq!(msgpack::decode(&stable).unwrap(), value);
    }

    #[test]
    fn prop_cbor_roundtrip(value in arb_value(true)) {
        let bytes = cbor::encode(&value).unwrap();
        prop_assert_eq!(cbor::decode(&bytes).unwrap(), value.clone());

        let stable = cbor::encode_stable(&value).unwrap();
        prop_assert_eq!(cbor::decode(&stable).unwrap(), value);
    }

    #[test]
    fn prop_ubjson_roundtrip(value in arb_value(false)) {
        let bytes = ubjson::encode(&value).unwrap();
        prop_assert_eq!(ubjson::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn prop_ion_roundtrip(value in arb_value(false)) {
        let bytes = ion::encode(&value).unwrap();
        prop_assert_eq!(ion::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn prop_bson_roundtrip(doc in arb_document()) {
        let bytes = bson::encode(&doc).unwrap();
        prop_assert_eq!(bson::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn prop_registry_matches_free_functions(doc in arb_document()) {
        let mut codecs = Codecs::new();
        for format in EncodingFormat::ALL {
            let bytes = codecs.encode(format, &doc).unwrap();
            prop_assert_eq!(codecs.decode(format, &bytes).unwrap(), doc.clone());
        }
    }

    #[test]
    fn prop_bson_size_prefix(doc in arb_document()) {
        let bytes = bson::encode(&doc).unwrap();
        let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        prop_assert_eq!(declared as usize, bytes.len());
        prop_assert_eq!(bytes[bytes.len() - 1], 0);
    }
}
