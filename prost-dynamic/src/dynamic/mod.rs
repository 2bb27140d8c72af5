mod convert;
mod display;
mod init;
mod map;
mod message;
mod repeated;
#[cfg(feature = "serde")]
mod serde;

#[cfg(feature = "serde")]
pub use self::serde::{DeserializeOptions, SerializeOptions};
pub use self::{
    init::Initializer,
    map::{MapField, MapKey},
    message::{FieldRef, Message},
    repeated::RepeatedField,
};

pub(crate) use self::convert::{convert, convert_for_field};

use prost::bytes::Bytes;

use crate::{descriptor::KindIndex, DescriptorPool, FieldDescriptor, Int64, Kind, UInt64};

/// The value of a field of any type.
///
/// A variant can stand for several field types, so the wire format of a value is only fixed
/// once it is stored in a field of a [`Message`].
///
/// Messages and containers are shared handles: cloning a `Value::Message`, `Value::List` or
/// `Value::Map` clones the handle, not its contents.
#[derive(Debug, Clone)]
pub enum Value {
    /// `bool`.
    Bool(bool),
    /// `int32`, `sint32` or `sfixed32`.
    I32(i32),
    /// `int64`, `sint64` or `sfixed64`, boxed.
    I64(Int64),
    /// `uint32` or `fixed32`.
    U32(u32),
    /// `uint64` or `fixed64`, boxed.
    U64(UInt64),
    /// `float`.
    F32(f32),
    /// `double`.
    F64(f64),
    /// `string`. Always valid UTF-8.
    String(String),
    /// `bytes`.
    Bytes(Bytes),
    /// The number of an enum value. Numbers the enum does not declare are kept as they are.
    EnumNumber(i32),
    /// A sub-message. `None` when a singular message field is unset.
    Message(Option<Message>),
    /// The contents of a repeated field.
    List(RepeatedField),
    /// The contents of a map field.
    Map(MapField),
}

impl Value {
    /// What `field` holds in a freshly created message: an empty container for repeated and map
    /// fields, `Message(None)` for message fields, and the zero of the field type otherwise.
    pub fn default_value_for_field(field: &FieldDescriptor) -> Self {
        if field.is_map() {
            match MapField::for_field(field) {
                Ok(map) => Value::Map(map),
                Err(_) => unreachable!("map fields have valid entry types"),
            }
        } else if field.is_list() {
            Value::List(RepeatedField::new(field.kind()))
        } else {
            Self::default_value(&field.kind())
        }
    }

    /// The zero of a single element of type `kind`. Never a list or map.
    pub fn default_value(kind: &Kind) -> Self {
        match kind {
            Kind::Message(_) => Value::Message(None),
            Kind::Enum(_) => Value::EnumNumber(0),
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(Int64::default()),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(UInt64::default()),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
        }
    }

    pub(crate) fn default_value_for_index(pool: &DescriptorPool, kind: KindIndex) -> Self {
        Self::default_value(&Kind::new(pool, kind))
    }

    /// Returns `true` if this value is not written to the wire by a singular field outside a
    /// oneof.
    ///
    /// Scalars are default when they equal their zero value, messages when they are `None` and
    /// containers when they are empty. Negative zero is not a default.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(value) => !*value,
            Value::I32(value) => *value == 0,
            Value::I64(value) => value.get() == 0,
            Value::U32(value) => *value == 0,
            Value::U64(value) => value.get() == 0,
            Value::F32(value) => value.to_bits() == 0,
            Value::F64(value) => value.to_bits() == 0,
            Value::String(value) => value.is_empty(),
            Value::Bytes(value) => value.is_empty(),
            Value::EnumNumber(value) => *value == 0,
            Value::Message(value) => value.is_none(),
            Value::List(list) => list.is_empty(),
            Value::Map(map) => map.is_empty(),
        }
    }

    /// Returns the name of the representation, e.g. `i32` or `message`.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "Int64",
            Value::U32(_) => "u32",
            Value::U64(_) => "UInt64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// The flag held by a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// The number held by an `I32`.
    pub fn as_i32(&self) -> Option<i32> {
        if let Value::I32(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// The number held by an `I64`, unboxed.
    pub fn as_i64(&self) -> Option<i64> {
        if let Value::I64(n) = self {
            Some(n.get())
        } else {
            None
        }
    }

    /// The number held by a `U32`.
    pub fn as_u32(&self) -> Option<u32> {
        if let Value::U32(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// The number held by a `U64`, unboxed.
    pub fn as_u64(&self) -> Option<u64> {
        if let Value::U64(n) = self {
            Some(n.get())
        } else {
            None
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        if let Value::F32(f) = self {
            Some(*f)
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if let Value::F64(f) = self {
            Some(*f)
        } else {
            None
        }
    }

    /// The number held by an `EnumNumber`, whether or not the enum declares it.
    pub fn as_enum_number(&self) -> Option<i32> {
        if let Value::EnumNumber(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        if let Value::Bytes(b) = self {
            Some(b)
        } else {
            None
        }
    }

    /// The message held by a set `Message`. An unset message field gives `None`.
    pub fn as_message(&self) -> Option<&Message> {
        if let Value::Message(Some(message)) = self {
            Some(message)
        } else {
            None
        }
    }

    /// The shared list handle held by a `List`.
    pub fn as_list(&self) -> Option<&RepeatedField> {
        if let Value::List(list) = self {
            Some(list)
        } else {
            None
        }
    }

    /// The shared map handle held by a `Map`.
    pub fn as_map(&self) -> Option<&MapField> {
        if let Value::Map(map) = self {
            Some(map)
        } else {
            None
        }
    }
}

/// Values compare deeply: messages and containers are equal when their contents are.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        message::value_eq(self, other, 0)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    Int64 => I64,
    u32 => U32,
    u64 => U64,
    UInt64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    RepeatedField => List,
    MapField => Map,
}

impl From<Message> for Value {
    fn from(value: Message) -> Self {
        Value::Message(Some(value))
    }
}

impl From<Option<Message>> for Value {
    fn from(value: Option<Message>) -> Self {
        Value::Message(value)
    }
}
