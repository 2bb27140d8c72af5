//! Conversion of values into the representation required by a field type.

use crate::{EnumDescriptor, Error, FieldDescriptor, Int64, Kind, UInt64, Value};

/// Converts `value` to the representation of a single element of type `kind`.
pub(crate) fn convert(kind: &Kind, value: Value) -> Result<Value, Error> {
    match kind {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => to_i32(value).map(Value::I32),
        Kind::Uint32 | Kind::Fixed32 => to_u32(value).map(Value::U32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => to_i64(value).map(Value::I64),
        Kind::Uint64 | Kind::Fixed64 => to_u64(value).map(Value::U64),
        Kind::Float => to_f64(kind, value).map(|f| Value::F32(f as f32)),
        Kind::Double => to_f64(kind, value).map(Value::F64),
        Kind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            value => Err(mismatch(kind, &value)),
        },
        Kind::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            value => Err(mismatch(kind, &value)),
        },
        Kind::Bytes => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            value => Err(mismatch(kind, &value)),
        },
        Kind::Enum(enum_desc) => to_enum(enum_desc, value).map(Value::EnumNumber),
        Kind::Message(desc) => match value {
            Value::Message(None) => Ok(Value::Message(None)),
            Value::Message(Some(message)) => {
                if message.descriptor() == desc {
                    Ok(Value::Message(Some(message)))
                } else {
                    Err(Error::descriptor_mismatch(
                        desc.full_name(),
                        message.descriptor().full_name(),
                    ))
                }
            }
            value => Err(mismatch(kind, &value)),
        },
    }
}

/// Converts `value` to the representation of the whole of `field`, which for repeated and map
/// fields is a container of the same element types.
pub(crate) fn convert_for_field(field: &FieldDescriptor, value: Value) -> Result<Value, Error> {
    if field.is_map() {
        let entry = field.kind();
        let entry = entry.as_message().expect("map fields have a message type");
        let key_kind = entry.map_entry_key_field().kind();
        let value_kind = entry.map_entry_value_field().kind();
        match value {
            Value::Map(map) if *map.key_kind() == key_kind && *map.value_kind() == value_kind => {
                Ok(Value::Map(map))
            }
            value => Err(Error::type_mismatch(
                format_args!("map<{}, {}>", key_kind, value_kind),
                value.type_name(),
            )),
        }
    } else if field.is_list() {
        let kind = field.kind();
        match value {
            Value::List(list) if *list.kind() == kind => Ok(Value::List(list)),
            value => Err(Error::type_mismatch(
                format_args!("repeated {}", kind),
                value.type_name(),
            )),
        }
    } else {
        convert(&field.kind(), value)
    }
}

fn mismatch(kind: &Kind, value: &Value) -> Error {
    Error::type_mismatch(kind, value.type_name())
}

/// Returns the float as an integer if it has no fractional part.
fn integral(value: f64, target: &'static str) -> Result<f64, Error> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value)
    } else {
        Err(Error::type_mismatch(target, format_args!("non-integral float {}", value)))
    }
}

fn to_i32(value: Value) -> Result<i32, Error> {
    const TARGET: &str = "int32";
    match value {
        Value::I32(i) => Ok(i),
        Value::U32(u) => i32::try_from(u).map_err(|_| Error::range(u, TARGET)),
        Value::I64(i) => i32::try_from(i.get()).map_err(|_| Error::range(i, TARGET)),
        Value::U64(u) => i32::try_from(u.get()).map_err(|_| Error::range(u, TARGET)),
        Value::F32(f) => float_to_i32(f.into()),
        Value::F64(f) => float_to_i32(f),
        value => Err(Error::type_mismatch(TARGET, value.type_name())),
    }
}

fn float_to_i32(value: f64) -> Result<i32, Error> {
    let value = integral(value, "int32")?;
    if (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&value) {
        Ok(value as i32)
    } else {
        Err(Error::range(value, "int32"))
    }
}

fn to_u32(value: Value) -> Result<u32, Error> {
    const TARGET: &str = "uint32";
    match value {
        Value::U32(u) => Ok(u),
        Value::I32(i) => u32::try_from(i).map_err(|_| Error::range(i, TARGET)),
        Value::I64(i) => u32::try_from(i.get()).map_err(|_| Error::range(i, TARGET)),
        Value::U64(u) => u32::try_from(u.get()).map_err(|_| Error::range(u, TARGET)),
        Value::F32(f) => float_to_u32(f.into()),
        Value::F64(f) => float_to_u32(f),
        value => Err(Error::type_mismatch(TARGET, value.type_name())),
    }
}

fn float_to_u32(value: f64) -> Result<u32, Error> {
    let value = integral(value, "uint32")?;
    if (0.0..=f64::from(u32::MAX)).contains(&value) {
        Ok(value as u32)
    } else {
        Err(Error::range(value, "uint32"))
    }
}

fn to_i64(value: Value) -> Result<Int64, Error> {
    match value {
        Value::I64(i) => Ok(i),
        Value::U64(u) => Int64::try_from(u),
        value => Err(Error::type_mismatch("Int64", value.type_name())),
    }
}

fn to_u64(value: Value) -> Result<UInt64, Error> {
    match value {
        Value::U64(u) => Ok(u),
        Value::I64(i) => UInt64::try_from(i),
        value => Err(Error::type_mismatch("UInt64", value.type_name())),
    }
}

fn to_f64(kind: &Kind, value: Value) -> Result<f64, Error> {
    match value {
        Value::F64(f) => Ok(f),
        Value::F32(f) => Ok(f.into()),
        Value::I32(i) => Ok(i.into()),
        Value::U32(u) => Ok(u.into()),
        Value::I64(i) => Ok(i.get() as f64),
        Value::U64(u) => Ok(u.get() as f64),
        value => Err(mismatch(kind, &value)),
    }
}

fn to_enum(enum_desc: &EnumDescriptor, value: Value) -> Result<i32, Error> {
    match value {
        Value::EnumNumber(n) => Ok(n),
        Value::I32(i) if i >= 0 => Ok(i),
        Value::I32(i) => Err(Error::range(i, "enum")),
        Value::U32(u) => i32::try_from(u).map_err(|_| Error::range(u, "enum")),
        Value::String(name) => match enum_desc.get_value_by_name(&name) {
            Some(value) => Ok(value.number()),
            None => Err(Error::type_mismatch(
                enum_desc.full_name(),
                format_args!("unknown enum value name '{}'", name),
            )),
        },
        value => Err(Error::type_mismatch(enum_desc.full_name(), value.type_name())),
    }
}
