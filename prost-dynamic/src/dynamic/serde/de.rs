use std::{borrow::Cow, fmt, str::FromStr};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use prost::bytes::Bytes;
use serde::de::{
    self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Unexpected, Visitor,
};

use crate::{
    codec::RECURSION_LIMIT,
    dynamic::serde::DeserializeOptions,
    Error, FieldDescriptor, Int64, Kind, MapField, Message, MessageDescriptor,
    RepeatedField, UInt64, Value,
};

const PADDING_INDIFFERENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, PADDING_INDIFFERENT);
const URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, PADDING_INDIFFERENT);

pub(super) fn deserialize_message<'de, D>(
    desc: &MessageDescriptor,
    deserializer: D,
    options: &DeserializeOptions,
    depth: usize,
) -> Result<Message, D::Error>
where
    D: Deserializer<'de>,
{
    if depth > RECURSION_LIMIT {
        return Err(de::Error::custom(Error::too_deep(RECURSION_LIMIT)));
    }

    deserializer.deserialize_map(MessageVisitor {
        desc,
        options,
        depth,
    })
}

/// Reads the value of a field. `None` means the field was `null`.
struct FieldSeed<'a> {
    field: &'a FieldDescriptor,
    options: &'a DeserializeOptions,
    depth: usize,
}

struct KindSeed<'a> {
    kind: &'a Kind,
    options: &'a DeserializeOptions,
    depth: usize,
}

struct MessageVisitor<'a> {
    desc: &'a MessageDescriptor,
    options: &'a DeserializeOptions,
    depth: usize,
}

struct ListVisitor<'a>(KindSeed<'a>);
struct MapVisitor<'a> {
    map: MapField,
    options: &'a DeserializeOptions,
    depth: usize,
}

impl<'a, 'de> Visitor<'de> for MessageVisitor<'a> {
    type Value = Message;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let message = Message::new(self.desc.clone());
        let table = self.desc.json_table();

        while let Some(key) = map.next_key::<Cow<str>>()? {
            if let Some(index) = table.get(key.as_ref()) {
                let field = self.desc.field_at(index);
                let value = map.next_value_seed(FieldSeed {
                    field: &field,
                    options: self.options,
                    depth: self.depth,
                })?;
                if let Some(value) = value {
                    message.set(&field, value).map_err(de::Error::custom)?;
                }
            } else if self.options.deny_unknown_fields {
                return Err(de::Error::custom(Error::unknown_field(
                    self.desc.full_name(),
                    key.as_ref(),
                )));
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(message)
    }
}

impl<'a, 'de> DeserializeSeed<'de> for FieldSeed<'a> {
    type Value = Option<Value>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_option(self)
    }
}

impl<'a, 'de> Visitor<'de> for FieldSeed<'a> {
    type Value = Option<Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "option")
    }

    #[inline]
    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        self.visit_none()
    }

    #[inline]
    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        let field = self.field;
        if field.is_map() {
            let map = MapField::for_field(field).map_err(de::Error::custom)?;
            deserializer
                .deserialize_map(MapVisitor {
                    map,
                    options: self.options,
                    depth: self.depth,
                })
                .map(|map| Some(Value::Map(map)))
        } else if field.is_list() {
            let kind = field.kind();
            deserializer
                .deserialize_seq(ListVisitor(KindSeed {
                    kind: &kind,
                    options: self.options,
                    depth: self.depth,
                }))
                .map(|list| Some(Value::List(list)))
        } else {
            KindSeed {
                kind: &field.kind(),
                options: self.options,
                depth: self.depth,
            }
            .deserialize(deserializer)
            .map(Some)
        }
    }
}

impl<'de> DeserializeSeed<'de> for KindSeed<'_> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.kind {
            Kind::Message(desc) => {
                deserialize_message(desc, deserializer, self.options, self.depth + 1)
                    .map(Value::from)
            }
            kind => {
                let scalar = deserializer.deserialize_any(ScalarVisitor)?;
                read_scalar(kind, scalar)
            }
        }
    }
}

impl<'a, 'de> Visitor<'de> for ListVisitor<'a> {
    type Value = RepeatedField;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a list")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let KindSeed {
            kind,
            options,
            depth,
        } = self.0;

        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(value) = seq.next_element_seed(KindSeed {
            kind,
            options,
            depth,
        })? {
            values.push(value);
        }

        let list = RepeatedField::new(kind.clone());
        list.extend(values).map_err(de::Error::custom)?;
        Ok(list)
    }
}

impl<'a, 'de> Visitor<'de> for MapVisitor<'a> {
    type Value = MapField;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let key_kind = self.map.key_kind().clone();
        let value_kind = self.map.value_kind().clone();

        while let Some(key_str) = map.next_key::<Cow<str>>()? {
            let key = parse_key(&key_kind, key_str.as_ref())?;
            let value = map.next_value_seed(KindSeed {
                kind: &value_kind,
                options: self.options,
                depth: self.depth,
            })?;
            self.map.set_value(key, value).map_err(de::Error::custom)?;
        }

        Ok(self.map)
    }
}

fn parse_key<E: de::Error>(kind: &Kind, key: &str) -> Result<Value, E> {
    fn parse<T: FromStr, E: de::Error>(key: &str, kind: &Kind) -> Result<T, E> {
        key.parse().map_err(|_| {
            E::custom(Error::type_mismatch(kind, format_args!("map key {:?}", key)))
        })
    }

    Ok(match kind {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(parse(key, kind)?),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(parse(key, kind)?),
        Kind::Uint32 | Kind::Fixed32 => Value::U32(parse(key, kind)?),
        Kind::Uint64 | Kind::Fixed64 => Value::U64(parse(key, kind)?),
        Kind::Bool => Value::Bool(parse(key, kind)?),
        Kind::Bytes => Value::Bytes(decode_base64(key)?),
        _ => Value::String(key.to_owned()),
    })
}

/// A JSON scalar as it was read, before it is checked against the field's kind.
enum Scalar<'de> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(Cow<'de, str>),
}

impl Scalar<'_> {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Scalar::Bool(b) => Unexpected::Bool(*b),
            Scalar::Int(n) => Unexpected::Signed(*n),
            Scalar::Uint(n) => Unexpected::Unsigned(*n),
            Scalar::Float(f) => Unexpected::Float(*f),
            Scalar::Str(s) => Unexpected::Str(s),
        }
    }

    fn mismatch<E: de::Error>(&self, expected: &str) -> E {
        E::invalid_type(self.unexpected(), &expected)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar<'de>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean, number or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Scalar::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Scalar::Uint(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Scalar::Float(v))
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Self::Value, E> {
        Ok(Scalar::Str(Cow::Borrowed(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Scalar::Str(Cow::Owned(v.to_owned())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Scalar::Str(Cow::Owned(v)))
    }
}

fn read_scalar<E: de::Error>(kind: &Kind, scalar: Scalar<'_>) -> Result<Value, E> {
    match kind {
        Kind::Double => read_float(scalar).map(Value::F64),
        Kind::Float => read_float(scalar).and_then(narrow).map(Value::F32),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            read_integer(scalar, "a 32-bit signed integer").map(Value::I32)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            read_integer(scalar, "a 64-bit signed integer").map(|n| Value::I64(Int64::new(n)))
        }
        Kind::Uint32 | Kind::Fixed32 => {
            read_integer(scalar, "a 32-bit unsigned integer").map(Value::U32)
        }
        Kind::Uint64 | Kind::Fixed64 => {
            read_integer(scalar, "a 64-bit unsigned integer").map(|n| Value::U64(UInt64::new(n)))
        }
        Kind::Bool => match scalar {
            Scalar::Bool(b) => Ok(Value::Bool(b)),
            other => Err(other.mismatch("a boolean")),
        },
        Kind::String => match scalar {
            Scalar::Str(s) => Ok(Value::String(s.into_owned())),
            other => Err(other.mismatch("a string")),
        },
        Kind::Bytes => match scalar {
            Scalar::Str(s) => decode_base64(&s).map(Value::Bytes),
            other => Err(other.mismatch("a base64-encoded string")),
        },
        Kind::Enum(desc) => match scalar {
            Scalar::Str(name) => match desc.get_value_by_name(&name) {
                Some(value) => Ok(Value::EnumNumber(value.number())),
                None => Err(E::custom(format!(
                    "unrecognized value '{}' for enum '{}'",
                    name,
                    desc.full_name()
                ))),
            },
            other => read_integer(other, "an enum name or number").map(Value::EnumNumber),
        },
        Kind::Message(desc) => Err(scalar.mismatch(&format!("a '{}' object", desc.full_name()))),
    }
}

/// Reads an integer from a number or a decimal string. Floats are accepted when integral.
fn read_integer<T, E>(scalar: Scalar<'_>, expected: &str) -> Result<T, E>
where
    T: TryFrom<i128>,
    E: de::Error,
{
    let wide: i128 = match scalar {
        Scalar::Int(n) => n.into(),
        Scalar::Uint(n) => n.into(),
        // Saturates, so huge values still fail the range check below.
        Scalar::Float(f) if f.fract() == 0.0 => f as i128,
        Scalar::Float(_) => return Err(E::custom("expected integer value")),
        Scalar::Str(s) => s.parse().map_err(E::custom)?,
        Scalar::Bool(_) => return Err(scalar.mismatch(expected)),
    };
    T::try_from(wide).map_err(|_| E::custom(format!("{wide} is out of range for {expected}")))
}

fn read_float<E: de::Error>(scalar: Scalar<'_>) -> Result<f64, E> {
    match scalar {
        Scalar::Float(f) => Ok(f),
        Scalar::Int(n) => Ok(n as f64),
        Scalar::Uint(n) => Ok(n as f64),
        Scalar::Str(s) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(f),
            Ok(_) => Err(E::custom(format!("non-finite float value '{s}' is not supported"))),
            Err(err) => Err(E::custom(err)),
        },
        Scalar::Bool(_) => Err(scalar.mismatch("a floating point number")),
    }
}

fn narrow<E: de::Error>(f: f64) -> Result<f32, E> {
    if (f64::from(f32::MIN)..=f64::from(f32::MAX)).contains(&f) {
        Ok(f as f32)
    } else {
        Err(E::custom("float value out of range"))
    }
}

/// Either base64 alphabet is accepted, with or without padding.
fn decode_base64<E: de::Error>(s: &str) -> Result<Bytes, E> {
    let engine = if s.contains(['-', '_']) {
        &URL_SAFE
    } else {
        &STANDARD
    };
    engine
        .decode(s)
        .map(Bytes::from)
        .map_err(|err| E::custom(format!("invalid base64: {err}")))
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use serde_json::json;

    use crate::{
        DescriptorPool, EnumBuilder, ErrorKind, FieldType, FileBuilder, MessageBuilder,
        OneofBuilder, SerializeOptions,
    };

    use super::*;

    static POOL: Lazy<DescriptorPool> = Lazy::new(|| {
        let mut file = FileBuilder::new("json.proto");
        file.package("json").unwrap();
        file.add_enum(
            EnumBuilder::new("Color")
                .value("COLOR_UNSPECIFIED", 0)
                .value("RED", 1),
        )
        .unwrap();
        file.add_message(
            MessageBuilder::new("M")
                .field("int_value", 1, FieldType::Int32)
                .field("long_value", 2, FieldType::Int64)
                .field("double_value", 3, FieldType::Double)
                .field("bytes_value", 4, FieldType::Bytes)
                .field("color", 5, FieldType::Enum("Color".to_owned()))
                .field("child", 6, FieldType::Message("M".to_owned()))
                .repeated("colors", 7, FieldType::Enum("Color".to_owned()))
                .map("m", 8, FieldType::String, FieldType::Int32)
                .map("by_id", 9, FieldType::Uint64, FieldType::Message("M".to_owned()))
                .oneof(OneofBuilder::new("o").field("flag", 10, FieldType::Bool)),
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_builder(&mut file).unwrap();
        pool
    });

    fn desc() -> MessageDescriptor {
        POOL.get_message_by_name("json.M").unwrap()
    }

    fn from_json(value: serde_json::Value) -> Result<Message, serde_json::Error> {
        Message::deserialize(desc(), value)
    }

    fn to_json(message: &Message, options: &SerializeOptions) -> serde_json::Value {
        message
            .serialize_with_options(serde_json::value::Serializer, options)
            .unwrap()
    }

    #[test]
    fn canonical_forms() {
        let message = from_json(json!({
            "intValue": -3,
            "long_value": "-9007199254740993",
            "doubleValue": 3,
            "bytesValue": "aGk",
            "color": "RED",
            "child": { "color": 7 },
            "colors": [1, "COLOR_UNSPECIFIED"],
            "m": { "b": 2, "a": 1 },
            "byId": { "10": {}, "2": { "intValue": 1 } },
            "flag": false,
        }))
        .unwrap();

        similar_asserts::assert_eq!(
            to_json(&message, &SerializeOptions::new()),
            json!({
                "intValue": -3,
                "longValue": "-9007199254740993",
                "doubleValue": 3.0,
                "bytesValue": "aGk=",
                "color": "RED",
                "child": { "color": 7 },
                "colors": ["RED", "COLOR_UNSPECIFIED"],
                "m": { "a": 1, "b": 2 },
                "byId": { "2": { "intValue": 1 }, "10": {} },
                "flag": false,
            })
        );
    }

    #[test]
    fn options() {
        let message = from_json(json!({ "longValue": 5, "color": "RED" })).unwrap();
        let options = SerializeOptions::new()
            .stringify_64_bit_integers(false)
            .use_enum_numbers(true)
            .use_proto_field_name(true)
            .skip_default_fields(false);

        similar_asserts::assert_eq!(
            to_json(&message, &options),
            json!({
                "int_value": 0,
                "long_value": 5,
                "double_value": 0.0,
                "bytes_value": "",
                "color": 1,
                "colors": [],
                "m": {},
                "by_id": {},
            })
        );
    }

    #[test]
    fn non_finite_floats() {
        let message = Message::new(desc());
        message.set("double_value", f64::NEG_INFINITY).unwrap();
        assert_eq!(
            to_json(&message, &SerializeOptions::new()),
            json!({ "doubleValue": "-Infinity" })
        );

        for input in ["NaN", "Infinity", "-Infinity", "1e999"] {
            assert!(from_json(json!({ "doubleValue": input })).is_err(), "{}", input);
        }
        let message = from_json(json!({ "doubleValue": "1.5" })).unwrap();
        assert_eq!(message.get("double_value").unwrap(), Value::F64(1.5));
    }

    #[test]
    fn url_safe_bytes() {
        let message = from_json(json!({ "bytesValue": "-_8" })).unwrap();
        assert_eq!(
            message.get("bytes_value").unwrap(),
            Value::Bytes(Bytes::from_static(&[0xfb, 0xff]))
        );
    }

    #[test]
    fn map_keys() {
        let mut file = FileBuilder::new("keys.proto");
        file.add_message(
            MessageBuilder::new("Keys")
                .map("by_bytes", 1, FieldType::Bytes, FieldType::Int32)
                .map("by_flag", 2, FieldType::Bool, FieldType::String)
                .map("by_sint", 3, FieldType::Sint32, FieldType::Bool),
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_builder(&mut file).unwrap();
        let desc = pool.get_message_by_name("Keys").unwrap();

        let message = Message::new(desc.clone());
        let by_bytes = message.get("by_bytes").unwrap();
        let by_bytes = by_bytes.as_map().unwrap();
        by_bytes.set(vec![1u8, 2, 3], 5).unwrap();
        by_bytes.set(vec![0xfbu8, 0xff], 6).unwrap();
        let by_flag = message.get("by_flag").unwrap();
        let by_flag = by_flag.as_map().unwrap();
        by_flag.set(true, "yes").unwrap();
        by_flag.set(false, "no").unwrap();
        message
            .get("by_sint")
            .unwrap()
            .as_map()
            .unwrap()
            .set(-4, true)
            .unwrap();

        let json = to_json(&message, &SerializeOptions::new());
        similar_asserts::assert_eq!(
            json,
            json!({
                "byBytes": { "AQID": 5, "+/8=": 6 },
                "byFlag": { "false": "no", "true": "yes" },
                "bySint": { "-4": true },
            })
        );
        assert_eq!(Message::deserialize(desc.clone(), json).unwrap(), message);

        let url_safe =
            Message::deserialize(desc.clone(), json!({ "byBytes": { "-_8": 1 } })).unwrap();
        let by_bytes = url_safe.get("by_bytes").unwrap();
        assert_eq!(
            by_bytes.as_map().unwrap().get(vec![0xfbu8, 0xff]),
            Some(Value::I32(1))
        );

        let err =
            Message::deserialize(desc.clone(), json!({ "byFlag": { "yes": "" } })).unwrap_err();
        assert!(err.to_string().contains("map key"), "{err}");
        let err = Message::deserialize(desc, json!({ "byBytes": { "%%": 1 } })).unwrap_err();
        assert!(err.to_string().starts_with("invalid base64"), "{err}");
    }

    #[test]
    fn numbers_in_any_form() {
        let message = from_json(json!({
            "intValue": "-7",
            "longValue": 4e3,
            "doubleValue": "-2.5e1",
            "color": 1.0,
        }))
        .unwrap();
        assert_eq!(message.get("int_value").unwrap(), Value::I32(-7));
        assert_eq!(message.get("long_value").unwrap(), Value::I64(Int64::new(4000)));
        assert_eq!(message.get("double_value").unwrap(), Value::F64(-25.0));
        assert_eq!(message.get("color").unwrap(), Value::EnumNumber(1));

        let err = from_json(json!({ "flag": "true" })).unwrap_err();
        assert!(err.to_string().starts_with("invalid type: string \"true\""), "{}", err);
        assert!(from_json(json!({ "intValue": "1.0" })).is_err());
        assert!(from_json(json!({ "longValue": 1e19 })).is_err());
        assert!(from_json(json!({ "bytesValue": 1 })).is_err());
    }

    #[test]
    fn null_is_default() {
        let message = from_json(json!({ "intValue": null, "child": null, "m": null })).unwrap();
        assert_eq!(message, Message::new(desc()));
    }

    #[test]
    fn errors() {
        let err = from_json(json!({ "unknown": 1 })).unwrap_err();
        assert_eq!(err.to_string(), "message 'json.M' has no field 'unknown'");

        let message = Message::deserialize_with_options(
            desc(),
            json!({ "unknown": { "a": [1] }, "intValue": 1 }),
            &DeserializeOptions::new().deny_unknown_fields(false),
        )
        .unwrap();
        assert_eq!(message.get("int_value").unwrap(), Value::I32(1));

        assert!(from_json(json!({ "intValue": 1.5 })).is_err());
        assert!(from_json(json!({ "intValue": 2147483648u64 })).is_err());
        assert!(from_json(json!({ "color": "BLUE" })).is_err());
        assert!(from_json(json!({ "m": { "a": "b" } })).is_err());
        assert!(from_json(json!({ "byId": { "x": {} } })).is_err());
        assert!(from_json(json!({ "bytesValue": "!!" })).is_err());
    }

    #[test]
    fn depth_limit() {
        let mut json = json!({});
        for _ in 0..RECURSION_LIMIT {
            json = json!({ "child": json });
        }
        let message = from_json(json.clone()).unwrap();
        assert!(serde_json::to_vec(&message).is_ok());

        let json = json!({ "child": json });
        let err = from_json(json).unwrap_err();
        assert!(err.to_string().contains("100"), "{}", err);

        let deep = Message::new(desc());
        deep.set("child", message).unwrap();
        let err = serde_json::to_vec(&deep).unwrap_err();
        assert!(err.to_string().contains("100"), "{}", err);
        assert_eq!(
            Error::too_deep(RECURSION_LIMIT).kind(),
            ErrorKind::CyclicOrTooDeep
        );
    }
}
