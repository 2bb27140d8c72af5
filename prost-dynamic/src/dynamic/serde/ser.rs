use base64::{display::Base64Display, prelude::BASE64_STANDARD};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{
    codec::RECURSION_LIMIT,
    dynamic::{serde::SerializeOptions, MapKey, Value},
    Error, Kind, Message,
};

/// A message viewed as a JSON object.
struct AsObject<'a> {
    message: &'a Message,
    options: &'a SerializeOptions,
}

/// A field value viewed as JSON. The kind picks enum names.
struct AsJson<'a> {
    value: &'a Value,
    kind: &'a Kind,
    options: &'a SerializeOptions,
}

/// A map key viewed as a JSON object key, which is always a string.
struct AsKey<'a>(&'a MapKey);

pub(super) fn serialize_message<S>(
    message: &Message,
    serializer: S,
    options: &SerializeOptions,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    nesting_within_limit(message, 0).map_err(S::Error::custom)?;
    AsObject { message, options }.serialize(serializer)
}

/// Walks the whole tree before writing, so a serializer never sees half a document.
fn nesting_within_limit(message: &Message, depth: usize) -> Result<(), Error> {
    if depth > RECURSION_LIMIT {
        return Err(Error::too_deep(RECURSION_LIMIT));
    }

    let visit = |value: Value| match value {
        Value::Message(Some(child)) => nesting_within_limit(&child, depth + 1),
        _ => Ok(()),
    };
    for (_, value) in message.fields() {
        match value {
            Value::List(list) => list.iter().try_for_each(visit)?,
            Value::Map(map) => map.values().try_for_each(visit)?,
            other => visit(other)?,
        }
    }
    Ok(())
}

impl Serialize for AsObject<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let AsObject { message, options } = *self;
        let desc = message.descriptor();
        let mut object = serializer.serialize_map(None)?;

        for entry in desc.wire_table().entries() {
            let value = match (message.is_set(entry), message.read_slot(entry)) {
                (true, value) => value,
                // Unset oneof members and absent sub-messages have no default to write.
                (false, _) if options.skip_default_fields || entry.case_slot.is_some() => continue,
                (false, Value::Message(None)) => continue,
                (false, value) => value,
            };

            let field = desc.field_at(entry.field);
            let key = if options.use_proto_field_name {
                field.name()
            } else {
                field.json_name()
            };
            let kind = field.kind();
            object.serialize_entry(
                key,
                &AsJson {
                    value: &value,
                    kind: &kind,
                    options,
                },
            )?;
        }

        object.end()
    }
}

impl AsJson<'_> {
    fn nested<'b>(&'b self, value: &'b Value, kind: &'b Kind) -> AsJson<'b> {
        AsJson {
            value,
            kind,
            options: self.options,
        }
    }

    fn enum_name(&self, number: i32) -> Option<String> {
        if self.options.use_enum_numbers {
            return None;
        }
        let value = self.kind.as_enum()?.get_value(number)?;
        Some(value.name().to_owned())
    }
}

impl Serialize for AsJson<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let stringify = self.options.stringify_64_bit_integers;
        match self.value {
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I32(n) => serializer.serialize_i32(*n),
            Value::U32(n) => serializer.serialize_u32(*n),
            Value::I64(n) if stringify => serializer.collect_str(n),
            Value::I64(n) => serializer.serialize_i64(n.get()),
            Value::U64(n) if stringify => serializer.collect_str(n),
            Value::U64(n) => serializer.serialize_u64(n.get()),
            Value::F32(f) if f.is_finite() => serializer.serialize_f32(*f),
            Value::F32(f) => serializer.serialize_str(special_float(f64::from(*f))),
            Value::F64(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::F64(f) => serializer.serialize_str(special_float(*f)),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.collect_str(&Base64Display::new(b, &BASE64_STANDARD)),
            Value::EnumNumber(number) => match self.enum_name(*number) {
                Some(name) => serializer.serialize_str(&name),
                None => serializer.serialize_i32(*number),
            },
            Value::Message(None) => serializer.serialize_unit(),
            Value::Message(Some(message)) => AsObject {
                message,
                options: self.options,
            }
            .serialize(serializer),
            Value::List(list) => list.with_values(|items| {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.nested(item, list.kind()))?;
                }
                seq.end()
            }),
            Value::Map(map) => {
                let entries = map.sorted_entries();
                let mut object = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    object.serialize_entry(&AsKey(key), &self.nested(value, map.value_kind()))?;
                }
                object.end()
            }
        }
    }
}

fn special_float(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl Serialize for AsKey<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            MapKey::String(s) => serializer.serialize_str(s),
            MapKey::Bytes(b) => serializer.collect_str(&Base64Display::new(b, &BASE64_STANDARD)),
            MapKey::Bool(b) => serializer.collect_str(b),
            MapKey::I32(n) => serializer.collect_str(n),
            MapKey::I64(n) => serializer.collect_str(n),
            MapKey::U32(n) => serializer.collect_str(n),
            MapKey::U64(n) => serializer.collect_str(n),
        }
    }
}
