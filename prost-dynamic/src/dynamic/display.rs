//! Inspect-style formatting, e.g. `test.A { name: "Kim", age: 7 }`.

use std::fmt;

use crate::{codec::RECURSION_LIMIT, Kind, Message, Value};

/// Writes a single value. `kind` is the element type, if known, used to print enum value names.
pub(crate) fn fmt_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    kind: Option<&Kind>,
    depth: usize,
) -> fmt::Result {
    match value {
        Value::Bool(value) => write!(f, "{}", value),
        Value::I32(value) => write!(f, "{}", value),
        Value::I64(value) => write!(f, "{}", value),
        Value::U32(value) => write!(f, "{}", value),
        Value::U64(value) => write!(f, "{}", value),
        Value::F32(value) => write!(f, "{}", value),
        Value::F64(value) => write!(f, "{}", value),
        Value::String(value) => write!(f, "{:?}", value),
        Value::Bytes(value) => write!(f, "b\"{}\"", value.escape_ascii()),
        Value::EnumNumber(number) => {
            match kind.and_then(Kind::as_enum).and_then(|e| e.get_value(*number)) {
                Some(value) => f.write_str(value.name()),
                None => write!(f, "{}", number),
            }
        }
        Value::Message(None) => f.write_str("null"),
        Value::Message(Some(message)) => message.fmt_at(f, depth + 1),
        Value::List(list) => list.fmt_at(f, depth + 1),
        Value::Map(map) => map.fmt_at(f, depth + 1),
    }
}

impl Message {
    pub(crate) fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        f.write_str(self.descriptor().full_name())?;
        if depth > RECURSION_LIMIT {
            return f.write_str(" { ... }");
        }

        let mut fields = self.fields().peekable();
        if fields.peek().is_none() {
            return f.write_str(" {}");
        }

        f.write_str(" { ")?;
        for (i, (field, value)) in fields.enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: ", field.name())?;
            fmt_value(f, &value, Some(&field.kind()), depth)?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(f, self, None, 0)
    }
}
