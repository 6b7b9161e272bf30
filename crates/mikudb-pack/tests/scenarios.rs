use chrono::TimeZone;
use mikudb_pack::msgpack::{self, MsgPackNavigator};
use mikudb_pack::{bson, ion, pack, ubjson, BsonValue, PackValue, PathSegment};

#[test]
fn test_msgpack_document_and_shallow_lookup() {
    let value = pack!({ "id": 123, "tags": ["a", "b", "c"] });
    let bytes = msgpack::encode(&value).unwrap();

    let expected = vec![
        0x82, // map(2)
        0xa2, b'i', b'd', 0x7b, // "id": 123
        0xa4, b't', b'a', b'g', b's', // "tags":
        0x93, 0xa1, b'a', 0xa1, b'b', 0xa1, b'c', // ["a", "b", "c"]
    ];
    assert_eq!(bytes, expected);
    assert_eq!(msgpack::decode(&bytes).unwrap(), value);

    let mut nav = MsgPackNavigator::new(&bytes);
    let tag = nav
        .find(&[PathSegment::from("tags"), PathSegment::Index(1)])
        .unwrap()
        .read_any()
        .unwrap();
    assert_eq!(tag, pack!("b"));
}

#[test]
fn test_bson_date_readable_by_bson_crate() {
    let millis = 1_700_000_000_123i64;
    let date = chrono::Utc.timestamp_millis_opt(millis).unwrap();
    let value = pack!({ "date": (BsonValue::DateTime(date)) });

    let bytes = bson::encode(&value).unwrap();
    let doc = ::bson::Document::from_reader(&mut &bytes[..]).unwrap();
    let decoded = doc.get_datetime("date").unwrap();
    assert_eq!(decoded.timestamp_millis(), millis);

    assert_eq!(bson::decode(&bytes).unwrap(), value);
}

#[test]
fn test_ion_nested_array_with_fresh_decoder() {
    let value = pack!([1, [2, [3, "x"]], null, false, true]);
    let bytes = ion::encode(&value).unwrap();

    assert_eq!(&bytes[..4], &[0xe0, 0x01, 0x00, 0xea]);
    let decoded = ion::IonDecoder::new(&bytes).decode().unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_ubjson_integer_width_boundaries() {
    let cases: [(i64, u8); 9] = [
        (127, b'U'),
        (128, b'U'),
        (255, b'U'),
        (256, b'I'),
        (65535, b'l'),
        (65536, b'l'),
        ((1 << 31) - 1, b'l'),
        (1 << 31, b'L'),
        ((1 << 32) - 1, b'L'),
    ];
    for (n, tag) in cases {
        let bytes = ubjson::encode(&PackValue::Int(n)).unwrap();
        assert_eq!(bytes[0], tag, "{}", n);
        assert_eq!(ubjson::decode(&bytes).unwrap(), PackValue::Int(n));
    }
}
