use std::{env, fs, path::PathBuf};

use once_cell::sync::Lazy;
use proptest::{collection, prelude::*};
use prost_dynamic::{
    DescriptorPool, ErrorKind, Int64, Message, MessageDescriptor, Value, RECURSION_LIMIT,
};
use serde_json::json;
use similar_asserts::assert_eq;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap()).join("tests/data")
}

/// Reads a descriptor set written as YAML, using the bootstrap pool to interpret it.
fn read_file_descriptor_set(name: &str) -> Message {
    let yaml_bytes = fs::read(test_data_dir().join(name)).unwrap();
    let desc = DescriptorPool::bootstrap()
        .get_message_by_name("google.protobuf.FileDescriptorSet")
        .unwrap();

    let deserializer = serde_yaml::Deserializer::from_slice(&yaml_bytes);
    Message::deserialize(desc, deserializer).unwrap()
}

static POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    let set = read_file_descriptor_set("scenarios.yml");
    let bytes = set.encode_to_vec().unwrap();
    DescriptorPool::decode(bytes.as_slice()).unwrap()
});

fn desc(name: &str) -> MessageDescriptor {
    POOL.get_message_by_name(&format!("scenarios.{}", name))
        .unwrap()
}

#[test]
fn yaml_descriptor_set() {
    let b = desc("B");
    let oneof = b.get_oneof_by_name("O").unwrap();
    assert_eq!(
        oneof.fields().map(|f| f.name().to_owned()).collect::<Vec<_>>(),
        ["x", "y"]
    );
    assert!(b.get_field_by_name("z").unwrap().containing_oneof().is_none());

    let scalars = desc("Scalars");
    assert_eq!(scalars.fields().len(), 20);
    assert!(scalars.get_field_by_name("labels").unwrap().is_map());
    assert!(scalars.get_field_by_name("ints").unwrap().is_list());
    assert_eq!(
        scalars
            .get_field_by_name("color")
            .unwrap()
            .kind()
            .as_enum()
            .unwrap()
            .full_name(),
        "scenarios.Color"
    );
    assert_eq!(
        desc("Node")
            .get_field(1)
            .unwrap()
            .kind()
            .as_message()
            .unwrap(),
        &desc("Node")
    );
}

#[test]
fn encode_and_decode() {
    let message = Message::new(desc("A"));
    message.set("name", "Kim").unwrap();
    message.set("age", 7).unwrap();

    let bytes = message.encode_to_vec().unwrap();
    assert_eq!(bytes, [0x0a, 0x03, 0x4b, 0x69, 0x6d, 0x10, 0x07]);

    let decoded = Message::decode(desc("A"), bytes.as_slice()).unwrap();
    assert_eq!(decoded.get("name").unwrap(), Value::from("Kim"));
    assert_eq!(decoded.get("age").unwrap(), Value::I32(7));
    assert_eq!(decoded, message);
}

#[test]
fn defaults_are_skipped() {
    let message = Message::new(desc("A"));
    message.set("name", "").unwrap();
    message.set("age", 0).unwrap();

    assert!(message.encode_to_vec().unwrap().is_empty());
    assert_eq!(message.encoded_len().unwrap(), 0);
}

#[test]
fn oneof_members_replace_each_other() {
    let message = Message::new(desc("B"));
    message.set("x", 3).unwrap();
    assert_eq!(message.encode_to_vec().unwrap(), [0x28, 0x03]);

    message.set("y", "hi").unwrap();
    assert_eq!(message.encode_to_vec().unwrap(), [0x32, 0x02, 0x68, 0x69]);
    assert_eq!(message.which_oneof_name("O").unwrap(), "y");
}

#[test]
fn map_encoding() {
    let message = Message::new(desc("C"));
    let map = message.get("m").unwrap();
    let map = map.as_map().unwrap();
    map.set("b", 2).unwrap();
    map.set("a", 1).unwrap();

    assert_eq!(
        message.encode_to_vec().unwrap(),
        [
            0x3a, 0x05, 0x0a, 0x01, b'a', 0x10, 0x01, //
            0x3a, 0x05, 0x0a, 0x01, b'b', 0x10, 0x02,
        ]
    );
    assert_eq!(
        serde_json::to_value(&message).unwrap(),
        json!({ "m": { "a": 1, "b": 2 } })
    );
    assert_eq!(
        serde_json::to_string(&message).unwrap(),
        r#"{"m":{"a":1,"b":2}}"#
    );

    let decoded = Message::deserialize(desc("C"), json!({ "m": { "a": 1, "b": 2 } })).unwrap();
    assert_eq!(decoded, message);
}

fn chain(levels: usize) -> Message {
    let root = Message::new(desc("Node"));
    let mut current = root.clone();
    for i in 0..levels {
        let child = Message::new(desc("Node"));
        child.set("value", i as i32 + 1).unwrap();
        current.set("child", child.clone()).unwrap();
        current = child;
    }
    root
}

#[test]
fn nesting_limit() {
    let ok = chain(RECURSION_LIMIT);
    let bytes = ok.encode_to_vec().unwrap();
    assert_eq!(Message::decode(desc("Node"), bytes.as_slice()).unwrap(), ok);

    let too_deep = chain(RECURSION_LIMIT + 1);
    let err = too_deep.encode_to_vec().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicOrTooDeep);
    assert_eq!(too_deep.encoded_len().unwrap_err().kind(), ErrorKind::CyclicOrTooDeep);
    assert!(serde_json::to_vec(&too_deep).is_err());

    let cyclic = Message::new(desc("Node"));
    cyclic.set("child", cyclic.clone()).unwrap();
    let mut buf = Vec::new();
    let err = cyclic.encode(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicOrTooDeep);
    assert!(buf.is_empty());
    cyclic.clear_field("child").unwrap();
}

#[test]
fn truncated_input() {
    let err = Message::decode(desc("A"), [0x0a, 0xff].as_slice()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedWire);
    assert_eq!(err.kind().to_string(), "malformed_wire");
}

#[test]
fn large_doubles_read_back_exactly() {
    let message = Message::new(desc("Scalars"));
    message.set("double", -2.7785775752716174e300).unwrap();

    let json = serde_json::to_string(&message).unwrap();
    let mut deserializer = serde_json::Deserializer::from_str(&json);
    let decoded = Message::deserialize(desc("Scalars"), &mut deserializer).unwrap();
    assert_eq!(
        decoded.get("double").unwrap(),
        Value::F64(-2.7785775752716174e300)
    );
}

#[test]
fn cleared_message_encodes_empty() {
    let message = Message::new(desc("Scalars"));
    message.set("string", "x").unwrap();
    message.set("child", Message::new(desc("Scalars"))).unwrap();
    message.get("ints").unwrap().as_list().unwrap().push(1).unwrap();
    assert!(!message.encode_to_vec().unwrap().is_empty());

    message.clear();
    assert!(message.encode_to_vec().unwrap().is_empty());
}

#[test]
fn out_of_range_writes_are_rejected() {
    let message = Message::new(desc("Scalars"));
    message.set("int32", 5).unwrap();

    let err = message.set("int32", Value::I64(Int64::new(1 << 40))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert_eq!(message.get("int32").unwrap(), Value::I32(5));

    let err = message.set("uint32", -1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert_eq!(message.get("uint32").unwrap(), Value::U32(0));

    let err = message.set("uint64", Value::I64(Int64::new(-1))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);

    let err = message.set("int64", 1.5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let ints = message.get("ints").unwrap();
    let ints = ints.as_list().unwrap();
    ints.push(1).unwrap();
    assert_eq!(ints.push(u32::MAX).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(ints.to_vec(), [Value::I32(1)]);
}

prop_compose! {
    fn numbers()(
        double in -1e300f64..1e300,
        float in -1e30f32..1e30,
        int32 in any::<i32>(),
        int64 in any::<i64>(),
        uint32 in any::<u32>(),
        uint64 in any::<u64>(),
        sint32 in any::<i32>(),
        sint64 in any::<i64>(),
        fixed32 in any::<u32>(),
        fixed64 in any::<u64>(),
        sfixed32 in any::<i32>(),
        sfixed64 in any::<i64>(),
    ) -> Vec<(&'static str, Value)> {
        vec![
            ("double", double.into()),
            ("float", float.into()),
            ("int32", int32.into()),
            ("int64", int64.into()),
            ("uint32", uint32.into()),
            ("uint64", uint64.into()),
            ("sint32", sint32.into()),
            ("sint64", sint64.into()),
            ("fixed32", fixed32.into()),
            ("fixed64", fixed64.into()),
            ("sfixed32", sfixed32.into()),
            ("sfixed64", sfixed64.into()),
        ]
    }
}

prop_compose! {
    fn scalars()(
        numbers in numbers(),
        boolean in any::<bool>(),
        string in "\\PC*",
        bytes in collection::vec(any::<u8>(), 0..8),
        color in 0..3i32,
        ints in collection::vec(any::<i32>(), 0..4),
        strings in collection::vec("[a-z]*", 0..4),
        labels in collection::btree_map(any::<i64>(), "[a-z]{0,4}", 0..4),
    ) -> Message {
        let message = Message::new(desc("Scalars"));
        for (name, value) in numbers {
            message.set(name, value).unwrap();
        }
        message.set("bool", boolean).unwrap();
        message.set("string", string).unwrap();
        message.set("bytes", bytes).unwrap();
        message.set("color", Value::EnumNumber(color)).unwrap();
        message.get("ints").unwrap().as_list().unwrap().extend(ints.into_iter().map(Value::from)).unwrap();
        message.get("strings").unwrap().as_list().unwrap().extend(strings.into_iter().map(Value::from)).unwrap();
        let map = message.get("labels").unwrap();
        for (key, value) in labels {
            map.as_map().unwrap().set(key, value).unwrap();
        }
        message
    }
}

proptest! {
    #[test]
    fn binary_round_trip(message in scalars()) {
        let bytes = message.encode_to_vec().unwrap();
        prop_assert_eq!(bytes.len(), message.encoded_len().unwrap());

        let decoded = Message::decode(desc("Scalars"), bytes.as_slice()).unwrap();
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn json_round_trip(message in scalars()) {
        let json = serde_json::to_string(&message).unwrap();
        let mut deserializer = serde_json::Deserializer::from_str(&json);
        let decoded = Message::deserialize(desc("Scalars"), &mut deserializer).unwrap();
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn merge_into_cleared(m in scalars(), n in scalars()) {
        m.clear();
        m.merge_from(&n).unwrap();
        prop_assert_eq!(m.encode_to_vec().unwrap(), n.encode_to_vec().unwrap());
    }

    #[test]
    fn oneof_last_write_wins(x in any::<i32>(), y in "\\PC*") {
        let message = Message::new(desc("B"));
        message.set("x", x).unwrap();
        prop_assert_eq!(message.which_oneof_name("O").unwrap(), "x");

        message.set("y", y.as_str()).unwrap();
        prop_assert_eq!(message.which_oneof_name("O").unwrap(), "y");
        prop_assert_eq!(message.get("x").unwrap(), Value::I32(0));
        prop_assert_eq!(message.get("y").unwrap(), Value::String(y));
    }

    #[test]
    fn map_set_get_remove(key in any::<i64>(), value in "[a-z]*") {
        let message = Message::new(desc("Scalars"));
        let labels = message.get("labels").unwrap();
        let labels = labels.as_map().unwrap();

        labels.set(key, value.as_str()).unwrap();
        prop_assert!(labels.contains_key(key));
        prop_assert_eq!(labels.get(key), Some(Value::String(value)));
        prop_assert!(labels.remove(key));
        prop_assert!(!labels.contains_key(key));
    }

    #[test]
    fn push_appends(values in collection::vec(any::<i32>(), 0..8), value in any::<i32>()) {
        let message = Message::new(desc("Scalars"));
        let ints = message.get("ints").unwrap();
        let ints = ints.as_list().unwrap();
        ints.extend(values.iter().copied().map(Value::from)).unwrap();

        let n = ints.len();
        ints.push(value).unwrap();
        prop_assert_eq!(ints.len(), n + 1);
        prop_assert_eq!(ints.get(n), Some(Value::I32(value)));
        prop_assert_eq!(message.get("ints").unwrap().as_list().unwrap().len(), n + 1);
    }
}
