use std::{cell::RefCell, fmt, mem, rc::Rc};

use crate::{
    codec::{FieldEntry, Shape, RECURSION_LIMIT},
    dynamic::convert_for_field,
    Error, FieldDescriptor, MessageDescriptor, Value,
};

/// A protobuf message whose type is only known at runtime.
///
/// A `Message` is a shared handle: cloning it produces another handle to the same fields, and
/// writes through either handle are visible through both. Use [`Message::duplicate`] for a deep
/// copy. Since submessages are handles too, the same message may appear in several parents, and
/// a message may even be assigned into one of its own descendants. The encoders, decoders and
/// deep operations stop at [`RECURSION_LIMIT`] levels of nesting, reporting an error of kind
/// [`CyclicOrTooDeep`](crate::ErrorKind::CyclicOrTooDeep).
///
/// Handles are not thread-safe; a message graph is confined to the thread that created it.
#[derive(Clone)]
pub struct Message {
    inner: Rc<MessageData>,
}

/// Storage for one instance, laid out by [`MessageDescriptor::layout`]. Case slots hold a
/// `Value::U32` with the number of the member that is set.
struct MessageData {
    desc: MessageDescriptor,
    slots: RefCell<Box<[Value]>>,
}

/// A way of naming a field of a message: its name (`&str`), its number (`u32`) or its
/// [`FieldDescriptor`].
pub trait FieldRef {
    /// Gets the descriptor of the field in `desc`, or an error of kind
    /// [`UnknownField`](crate::ErrorKind::UnknownField) if `desc` has no such field.
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error>;
}

impl FieldRef for str {
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error> {
        desc.get_field_by_name(self)
            .ok_or_else(|| Error::unknown_field(desc.full_name(), self))
    }
}

impl FieldRef for String {
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error> {
        self.as_str().resolve(desc)
    }
}

impl FieldRef for u32 {
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error> {
        desc.get_field(*self)
            .ok_or_else(|| Error::unknown_field(desc.full_name(), self))
    }
}

impl FieldRef for FieldDescriptor {
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error> {
        if self.parent_message() == desc {
            Ok(self.clone())
        } else {
            Err(Error::unknown_field(desc.full_name(), self.full_name()))
        }
    }
}

impl<T: FieldRef + ?Sized> FieldRef for &T {
    fn resolve(&self, desc: &MessageDescriptor) -> Result<FieldDescriptor, Error> {
        (**self).resolve(desc)
    }
}

impl Message {
    /// Creates a new message of the given type, with every field set to its default value.
    pub fn new(desc: MessageDescriptor) -> Self {
        let slots = initial_slots(&desc);
        Message {
            inner: Rc::new(MessageData {
                desc,
                slots: RefCell::new(slots),
            }),
        }
    }

    /// Gets a reference to the message type.
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.inner.desc
    }

    /// Gets the value of a field.
    ///
    /// For a oneof member that is not set, this returns the default value of the member. For
    /// repeated and map fields, it returns the container itself, so writes to the returned
    /// [`RepeatedField`](crate::RepeatedField) or [`MapField`](crate::MapField) update this
    /// message.
    pub fn get(&self, field: impl FieldRef) -> Result<Value, Error> {
        let field = field.resolve(self.descriptor())?;
        Ok(self.read_slot(self.entry(&field)))
    }

    /// Sets the value of a field.
    ///
    /// The value is converted to the field type first, and if that fails, the message is left
    /// unchanged. Setting a member of a oneof replaces whichever member was set before, and
    /// setting a message member of a oneof to `Value::Message(None)` clears the oneof.
    ///
    /// # Examples
    ///
    /// ```
    /// # use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, Message, MessageBuilder};
    /// let mut file = FileBuilder::new("example.proto");
    /// file.add_message(MessageBuilder::new("Person").field("age", 1, FieldType::Uint32))?;
    /// let mut pool = DescriptorPool::new();
    /// pool.add_builder(&mut file)?;
    ///
    /// let person = Message::new(pool.get_message_by_name("Person").unwrap());
    /// person.set("age", 7)?;
    /// assert_eq!(person.get("age")?.as_u32(), Some(7));
    /// assert!(person.set("age", -1).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set(&self, field: impl FieldRef, value: impl Into<Value>) -> Result<(), Error> {
        let field = field.resolve(self.descriptor())?;
        let value = convert_for_field(&field, value.into())?;
        self.write_slot(self.entry(&field), value);
        Ok(())
    }

    /// Returns `true` if a field is set: a oneof member is selected, a message is present, a
    /// container is not empty, or a scalar differs from its default value.
    pub fn has_field(&self, field: impl FieldRef) -> Result<bool, Error> {
        let field = field.resolve(self.descriptor())?;
        Ok(self.is_set(self.entry(&field)))
    }

    /// Resets a field to its default value. Clearing the member of a oneof that is set clears
    /// the oneof.
    pub fn clear_field(&self, field: impl FieldRef) -> Result<(), Error> {
        let field = field.resolve(self.descriptor())?;
        let entry = self.entry(&field);
        match entry.case_slot {
            Some(case) => {
                if self.case(case) == entry.number {
                    self.reset_oneof(entry);
                }
            }
            None => self.write_slot(entry, Value::default_value_for_field(&field)),
        }
        Ok(())
    }

    /// Resets every field to its default value.
    ///
    /// Repeated and map fields are given new empty containers. Containers previously obtained
    /// from this message are left as they were.
    pub fn clear(&self) {
        let slots = initial_slots(self.descriptor());
        let old = mem::replace(&mut *self.inner.slots.borrow_mut(), slots);
        drop(old);
    }

    /// Gets the member of the oneof `name` that is set, or `None` if no member is set.
    pub fn which_oneof(&self, name: &str) -> Result<Option<FieldDescriptor>, Error> {
        let desc = self.descriptor();
        let oneof = desc
            .get_oneof_by_name(name)
            .ok_or_else(|| Error::unknown_oneof(desc.full_name(), name))?;

        match self.case(desc.layout().oneof_slots(&oneof).case) {
            0 => Ok(None),
            number => Ok(desc.get_field(number)),
        }
    }

    /// Gets the name of the member of the oneof `name` that is set, or an empty string if no
    /// member is set.
    pub fn which_oneof_name(&self, name: &str) -> Result<String, Error> {
        Ok(self
            .which_oneof(name)?
            .map(|field| field.name().to_owned())
            .unwrap_or_default())
    }

    /// Returns an iterator over the fields that are set, in definition order, and their values.
    pub fn fields(&self) -> impl Iterator<Item = (FieldDescriptor, Value)> {
        let desc = self.descriptor();
        let fields: Vec<_> = desc
            .wire_table()
            .entries()
            .iter()
            .filter(|entry| self.is_set(entry))
            .map(|entry| (desc.field_at(entry.field), self.read_slot(entry)))
            .collect();
        fields.into_iter()
    }

    /// Merges the fields of `other` into this message.
    ///
    /// Scalars that are set in `other` overwrite those in this message, submessages are merged
    /// recursively, repeated fields are appended and map entries are inserted, replacing entries
    /// with the same key. Messages are copied, never shared with `other`. A message may be
    /// merged with itself.
    ///
    /// Fails if `other` has a different type. If a recursion error occurs part way through, this
    /// message may be left partially merged.
    pub fn merge_from(&self, other: &Message) -> Result<(), Error> {
        self.merge_at(other, 0)
    }

    /// Creates a deep copy of this message. Unlike [`Clone::clone`], the copy shares no
    /// submessages or containers with this message.
    pub fn duplicate(&self) -> Result<Message, Error> {
        self.duplicate_at(0)
    }

    fn duplicate_at(&self, depth: usize) -> Result<Message, Error> {
        let copy = Message::new(self.descriptor().clone());
        copy.merge_at(self, depth)?;
        Ok(copy)
    }

    fn merge_at(&self, other: &Message, depth: usize) -> Result<(), Error> {
        if depth > RECURSION_LIMIT {
            return Err(Error::too_deep(RECURSION_LIMIT));
        }
        if self.descriptor() != other.descriptor() {
            return Err(Error::descriptor_mismatch(
                self.descriptor().full_name(),
                other.descriptor().full_name(),
            ));
        }
        if Rc::ptr_eq(&self.inner, &other.inner) {
            let snapshot = other.duplicate_at(depth)?;
            return self.merge_at(&snapshot, depth);
        }

        for entry in self.descriptor().wire_table().entries() {
            if !other.is_set(entry) {
                continue;
            }

            match (entry.shape, other.read_slot(entry)) {
                (Shape::List, Value::List(source)) => {
                    if let Value::List(target) = self.read_slot(entry) {
                        for value in source.to_vec() {
                            target.push_converted(copy_value(value, depth)?);
                        }
                    }
                }
                (Shape::Map { .. }, Value::Map(source)) => {
                    if let Value::Map(target) = self.read_slot(entry) {
                        for (key, value) in source.iter() {
                            target.set_value(key.into(), copy_value(value, depth)?)?;
                        }
                    }
                }
                (Shape::Singular, Value::Message(Some(source))) => match self.read_slot(entry) {
                    Value::Message(Some(target)) => target.merge_at(&source, depth + 1)?,
                    _ => {
                        let target = source.duplicate_at(depth + 1)?;
                        self.write_slot(entry, Value::Message(Some(target)));
                    }
                },
                (_, value) => self.write_slot(entry, value),
            }
        }
        Ok(())
    }

    pub(crate) fn entry(&self, field: &FieldDescriptor) -> &FieldEntry {
        &self.descriptor().wire_table().entries()[field.index() as usize]
    }

    /// Gets the number of the oneof member that is set, or `0`.
    pub(crate) fn case(&self, case_slot: usize) -> u32 {
        match self.inner.slots.borrow()[case_slot] {
            Value::U32(number) => number,
            _ => 0,
        }
    }

    pub(crate) fn is_set(&self, entry: &FieldEntry) -> bool {
        match entry.case_slot {
            Some(case) => self.case(case) == entry.number,
            None => !self.inner.slots.borrow()[entry.slot].is_default(),
        }
    }

    pub(crate) fn read_slot(&self, entry: &FieldEntry) -> Value {
        if let Some(case) = entry.case_slot {
            if self.case(case) != entry.number {
                return Value::default_value_for_index(self.descriptor().parent_pool(), entry.kind);
            }
        }
        self.inner.slots.borrow()[entry.slot].clone()
    }

    /// Writes a value already converted to the field type, updating the oneof case if needed.
    pub(crate) fn write_slot(&self, entry: &FieldEntry, value: Value) {
        let old = match entry.case_slot {
            Some(_) if matches!(value, Value::Message(None)) => {
                self.reset_oneof(entry);
                return;
            }
            Some(case) => {
                let mut slots = self.inner.slots.borrow_mut();
                slots[case] = Value::U32(entry.number);
                mem::replace(&mut slots[entry.slot], value)
            }
            None => mem::replace(&mut self.inner.slots.borrow_mut()[entry.slot], value),
        };
        drop(old);
    }

    /// Clears the oneof containing `entry`, resetting its value slot to the default of its
    /// first member.
    fn reset_oneof(&self, entry: &FieldEntry) {
        let Some(case) = entry.case_slot else {
            return;
        };

        let field = self.descriptor().field_at(entry.field);
        let first = match field.containing_oneof() {
            Some(oneof) => {
                let first = oneof.fields().next();
                first
            }
            None => None,
        };
        let default = match first {
            Some(first) => Value::default_value_for_field(&first),
            None => Value::Message(None),
        };

        let old = {
            let mut slots = self.inner.slots.borrow_mut();
            slots[case] = Value::U32(0);
            mem::replace(&mut slots[entry.slot], default)
        };
        drop(old);
    }

    pub(crate) fn eq_at(&self, other: &Message, depth: usize) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        if depth > RECURSION_LIMIT || self.descriptor() != other.descriptor() {
            return false;
        }

        let lhs = self.inner.slots.borrow();
        let rhs = other.inner.slots.borrow();
        lhs.iter()
            .zip(rhs.iter())
            .all(|(l, r)| value_eq(l, r, depth))
    }
}

fn initial_slots(desc: &MessageDescriptor) -> Box<[Value]> {
    let layout = desc.layout();
    let mut slots = vec![Value::U32(0); layout.slot_count()];

    for field in desc.fields() {
        if field.containing_oneof().is_none() {
            slots[layout.field_slot(&field)] = Value::default_value_for_field(&field);
        }
    }
    for oneof in desc.oneofs() {
        let first = oneof.fields().next();
        if let Some(first) = first {
            slots[layout.oneof_slots(&oneof).value] = Value::default_value_for_field(&first);
        }
    }

    slots.into()
}

/// Copies a value taken from another message, so that messages are never shared.
fn copy_value(value: Value, depth: usize) -> Result<Value, Error> {
    match value {
        Value::Message(Some(message)) => {
            Ok(Value::Message(Some(message.duplicate_at(depth + 1)?)))
        }
        value => Ok(value),
    }
}

/// Compares values deeply. Messages nested more than [`RECURSION_LIMIT`] levels deep compare
/// unequal.
pub(crate) fn value_eq(lhs: &Value, rhs: &Value, depth: usize) -> bool {
    match (lhs, rhs) {
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::I32(l), Value::I32(r)) => l == r,
        (Value::I64(l), Value::I64(r)) => l == r,
        (Value::U32(l), Value::U32(r)) => l == r,
        (Value::U64(l), Value::U64(r)) => l == r,
        (Value::F32(l), Value::F32(r)) => l == r,
        (Value::F64(l), Value::F64(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bytes(l), Value::Bytes(r)) => l == r,
        (Value::EnumNumber(l), Value::EnumNumber(r)) => l == r,
        (Value::Message(None), Value::Message(None)) => true,
        (Value::Message(Some(l)), Value::Message(Some(r))) => l.eq_at(r, depth + 1),
        (Value::List(l), Value::List(r)) => l.eq_at(r, depth),
        (Value::Map(l), Value::Map(r)) => l.eq_at(r, depth),
        _ => false,
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(other, 0)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message")
            .field(&format_args!("{}", self))
            .finish()
    }
}
