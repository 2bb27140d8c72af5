use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

use prost::bytes::Bytes;

use crate::{
    codec::RECURSION_LIMIT,
    dynamic::{convert, display, message::value_eq},
    Error, FieldDescriptor, Int64, Kind, UInt64, Value,
};

/// A map key value.
///
/// Like [`Value`], several protobuf key types share a representation, so a key is converted to
/// the key type of the map it is used with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// A boolean value, encoded as the `bool` protobuf type.
    Bool(bool),
    /// A 32-bit signed integer, encoded as one of the `int32`, `sint32` or `sfixed32` protobuf types.
    I32(i32),
    /// A 64-bit signed integer, encoded as one of the `int64`, `sint64` or `sfixed64` protobuf types.
    I64(Int64),
    /// A 32-bit unsigned integer, encoded as one of the `uint32` or `fixed32` protobuf types.
    U32(u32),
    /// A 64-bit unsigned integer, encoded as one of the `uint64` or `fixed64` protobuf types.
    U64(UInt64),
    /// A string, encoded as the `string` protobuf type.
    String(String),
    /// A byte string, encoded as the `bytes` protobuf type.
    Bytes(Bytes),
}

/// A shared map from keys of one protobuf type to values of another.
///
/// This is the storage of a `map<K, V>` field. Keys are kept in a normalized byte form, so
/// iteration order depends only on the keys present and not on the order they were inserted.
/// Cloning a `MapField` clones the handle.
#[derive(Clone)]
pub struct MapField {
    inner: Rc<MapInner>,
}

struct MapInner {
    key_kind: Kind,
    value_kind: Kind,
    entries: RefCell<BTreeMap<Box<[u8]>, Value>>,
}

impl MapKey {
    /// Returns `true` if this is the zero value of its type.
    pub fn is_default(&self) -> bool {
        Value::from(self.clone()).is_default()
    }

    fn from_bytes(kind: &Kind, bytes: &[u8]) -> MapKey {
        fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
            let mut array = [0; N];
            array.copy_from_slice(&bytes[..N]);
            array
        }

        match kind {
            Kind::Bool => MapKey::Bool(bytes[0] != 0),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
                MapKey::I32(i32::from_ne_bytes(array(bytes)))
            }
            Kind::Uint32 | Kind::Fixed32 => MapKey::U32(u32::from_ne_bytes(array(bytes))),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
                MapKey::I64(Int64::new(i64::from_ne_bytes(array(bytes))))
            }
            Kind::Uint64 | Kind::Fixed64 => {
                MapKey::U64(UInt64::new(u64::from_ne_bytes(array(bytes))))
            }
            Kind::String => MapKey::String(String::from_utf8_lossy(bytes).into_owned()),
            _ => MapKey::Bytes(Bytes::copy_from_slice(bytes)),
        }
    }
}

/// Normalizes a key already converted to the key representation.
fn key_bytes(key: &Value) -> Box<[u8]> {
    match key {
        Value::Bool(b) => Box::new([u8::from(*b)]),
        Value::I32(i) => i.to_ne_bytes().into(),
        Value::U32(u) => u.to_ne_bytes().into(),
        Value::I64(i) => i.get().to_ne_bytes().into(),
        Value::U64(u) => u.get().to_ne_bytes().into(),
        Value::String(s) => s.as_bytes().into(),
        Value::Bytes(b) => b.as_ref().into(),
        _ => unreachable!("map keys are converted before normalizing"),
    }
}

impl MapField {
    /// Creates an empty map.
    ///
    /// Fails with a type mismatch if `key_kind` is a float, double, enum or message type.
    pub fn new(key_kind: Kind, value_kind: Kind) -> Result<Self, Error> {
        if !key_kind.is_valid_map_key() {
            return Err(Error::type_mismatch("map key type", key_kind));
        }

        Ok(MapField {
            inner: Rc::new(MapInner {
                key_kind,
                value_kind,
                entries: RefCell::new(BTreeMap::new()),
            }),
        })
    }

    /// Creates an empty map suitable for storing in the map field `field`.
    pub fn for_field(field: &FieldDescriptor) -> Result<Self, Error> {
        match field.kind() {
            Kind::Message(entry) if field.is_map() => MapField::new(
                entry.map_entry_key_field().kind(),
                entry.map_entry_value_field().kind(),
            ),
            kind => Err(Error::type_mismatch(
                format_args!("map field {}", field.full_name()),
                kind,
            )),
        }
    }

    /// The key type.
    pub fn key_kind(&self) -> &Kind {
        &self.inner.key_kind
    }

    /// The value type.
    pub fn value_kind(&self) -> &Kind {
        &self.inner.value_kind
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Gets the value for `key`. Returns `None` if it is not present, or if `key` cannot be
    /// converted to the key type.
    pub fn get(&self, key: impl Into<MapKey>) -> Option<Value> {
        let key = self.convert_key(Value::from(key.into())).ok()?;
        self.inner.entries.borrow().get(&key).cloned()
    }

    /// Returns `true` if the map has an entry for `key`.
    pub fn contains_key(&self, key: impl Into<MapKey>) -> bool {
        match self.convert_key(Value::from(key.into())) {
            Ok(key) => self.inner.entries.borrow().contains_key(&key),
            Err(_) => false,
        }
    }

    /// Inserts an entry, overwriting any existing value for `key`.
    pub fn set(&self, key: impl Into<MapKey>, value: impl Into<Value>) -> Result<(), Error> {
        self.set_value(Value::from(key.into()), value.into())
    }

    /// Removes the entry for `key`, returning `true` if it was present.
    pub fn remove(&self, key: impl Into<MapKey>) -> bool {
        match self.convert_key(Value::from(key.into())) {
            Ok(key) => self.inner.entries.borrow_mut().remove(&key).is_some(),
            Err(_) => false,
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.entries.borrow_mut().clear();
    }

    /// Returns an iterator over a snapshot of the entries.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (MapKey, Value)> {
        let kind = self.key_kind();
        let entries = self.inner.entries.borrow();
        let snapshot: Vec<_> = entries
            .iter()
            .map(|(key, value)| (MapKey::from_bytes(kind, key), value.clone()))
            .collect();
        snapshot.into_iter()
    }

    /// Returns an iterator over a snapshot of the keys.
    pub fn keys(&self) -> impl ExactSizeIterator<Item = MapKey> {
        let keys: Vec<_> = self.iter().map(|(key, _)| key).collect();
        keys.into_iter()
    }

    /// Returns an iterator over a snapshot of the values.
    pub fn values(&self) -> impl ExactSizeIterator<Item = Value> {
        let entries = self.inner.entries.borrow();
        let values: Vec<_> = entries.values().cloned().collect();
        values.into_iter()
    }

    /// Inserts every entry of `other`, overwriting existing keys.
    ///
    /// Fails with a type mismatch if the key or value types differ.
    pub fn merge(&self, other: &MapField) -> Result<(), Error> {
        if self.key_kind() != other.key_kind() || self.value_kind() != other.value_kind() {
            return Err(Error::type_mismatch(
                format_args!("map<{}, {}>", self.key_kind(), self.value_kind()),
                format_args!("map<{}, {}>", other.key_kind(), other.value_kind()),
            ));
        }

        let source = other.inner.entries.borrow().clone();
        self.inner.entries.borrow_mut().extend(source);
        Ok(())
    }

    /// Inserts an entry, converting both the key and value.
    pub(crate) fn set_value(&self, key: Value, value: Value) -> Result<(), Error> {
        let key = self.convert_key(key)?;
        let value = match convert(self.value_kind(), value)? {
            Value::Message(None) => {
                return Err(Error::type_mismatch(self.value_kind(), "empty message"))
            }
            value => value,
        };
        self.inner.entries.borrow_mut().insert(key, value);
        Ok(())
    }

    /// Returns the entries sorted by key.
    pub(crate) fn sorted_entries(&self) -> Vec<(MapKey, Value)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|(l, _), (r, _)| l.cmp(r));
        entries
    }

    pub(crate) fn eq_at(&self, other: &Self, depth: usize) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        if self.key_kind() != other.key_kind() || self.value_kind() != other.value_kind() {
            return false;
        }

        let lhs = self.inner.entries.borrow();
        let rhs = other.inner.entries.borrow();
        lhs.len() == rhs.len()
            && lhs
                .iter()
                .zip(rhs.iter())
                .all(|((lk, lv), (rk, rv))| lk == rk && value_eq(lv, rv, depth))
    }

    pub(crate) fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > RECURSION_LIMIT {
            return f.write_str("{...}");
        }

        f.write_str("{")?;
        for (i, (key, value)) in self.sorted_entries().iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            display::fmt_value(f, &Value::from(key.clone()), Some(self.key_kind()), depth)?;
            f.write_str(": ")?;
            display::fmt_value(f, value, Some(self.value_kind()), depth)?;
        }
        f.write_str("}")
    }

    fn convert_key(&self, key: Value) -> Result<Box<[u8]>, Error> {
        convert(self.key_kind(), key).map(|key| key_bytes(&key))
    }
}

impl PartialEq for MapField {
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(other, 0)
    }
}

impl fmt::Debug for MapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for MapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl From<MapKey> for Value {
    fn from(value: MapKey) -> Self {
        match value {
            MapKey::Bool(value) => Value::Bool(value),
            MapKey::I32(value) => Value::I32(value),
            MapKey::I64(value) => Value::I64(value),
            MapKey::U32(value) => Value::U32(value),
            MapKey::U64(value) => Value::U64(value),
            MapKey::String(value) => Value::String(value),
            MapKey::Bytes(value) => Value::Bytes(value),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MapKey {
                fn from(value: $ty) -> Self {
                    MapKey::$variant(value.into())
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
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn invalid_key_kinds() {
        for kind in [Kind::Float, Kind::Double] {
            assert_eq!(
                MapField::new(kind, Kind::Int32).unwrap_err().kind(),
                ErrorKind::TypeMismatch
            );
        }
    }

    #[test]
    fn string_keys() {
        let map = MapField::new(Kind::String, Kind::Int32).unwrap();
        map.set("b", 2).unwrap();
        map.set("a", 1).unwrap();
        map.set("b", 3).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("b"), Some(Value::I32(3)));
        assert_eq!(map.get("c"), None);
        assert_eq!(map.get(1), None);
        assert!(map.contains_key("a"));
        assert_eq!(map.to_string(), r#"{"a": 1, "b": 3}"#);

        assert!(map.remove("a"));
        assert!(!map.remove("a"));
        assert_eq!(map.keys().collect::<Vec<_>>(), [MapKey::from("b")]);
    }

    #[test]
    fn integer_keys_convert() {
        let map = MapField::new(Kind::Sint64, Kind::Bool).unwrap();
        map.set(Int64::new(-5), true).unwrap();
        map.set(UInt64::new(7), false).unwrap();

        assert_eq!(map.get(Int64::new(7)), Some(Value::Bool(false)));
        assert_eq!(map.get(UInt64::new(u64::MAX)), None);
        assert_eq!(
            map.set(UInt64::MAX, true).unwrap_err().kind(),
            ErrorKind::Range
        );
        assert_eq!(map.set(1, true).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            map.sorted_entries()
                .into_iter()
                .map(|(k, _)| k)
                .collect::<Vec<_>>(),
            [MapKey::I64(Int64::new(-5)), MapKey::I64(Int64::new(7))]
        );
    }

    #[test]
    fn order_is_independent_of_insertion() {
        let a = MapField::new(Kind::Uint32, Kind::String).unwrap();
        let b = MapField::new(Kind::Uint32, Kind::String).unwrap();
        for key in [3u32, 1, 256, 2] {
            a.set(key, key.to_string()).unwrap();
        }
        for key in [256u32, 2, 3, 1] {
            b.set(key, key.to_string()).unwrap();
        }

        assert_eq!(a, b);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            b.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn merge_upserts() {
        let a = MapField::new(Kind::Bool, Kind::Int32).unwrap();
        let b = MapField::new(Kind::Bool, Kind::Int32).unwrap();
        a.set(true, 1).unwrap();
        b.set(true, 2).unwrap();
        b.set(false, 3).unwrap();

        a.merge(&b).unwrap();
        assert_eq!(a.to_string(), "{false: 3, true: 2}");

        a.merge(&a.clone()).unwrap();
        assert_eq!(a.len(), 2);

        let c = MapField::new(Kind::Bool, Kind::Int64).unwrap();
        assert_eq!(a.merge(&c).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }
}
