use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    codec::RECURSION_LIMIT,
    dynamic::{convert, display, message::value_eq, Message},
    Error, FieldDescriptor, Kind, Value,
};

/// A shared, growable sequence of values of a single element type.
///
/// This is the storage of a `repeated` field. Cloning a `RepeatedField` clones the handle, so a
/// list obtained from [`Message::get`] stays connected to the message it came from.
///
/// Every value written is first converted to the element type, and writes that fail to convert
/// leave the list unchanged.
#[derive(Clone)]
pub struct RepeatedField {
    inner: Rc<RepeatedInner>,
}

struct RepeatedInner {
    kind: Kind,
    values: RefCell<Vec<Value>>,
}

impl RepeatedField {
    /// Creates an empty list with elements of type `kind`.
    pub fn new(kind: Kind) -> Self {
        RepeatedField {
            inner: Rc::new(RepeatedInner {
                kind,
                values: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates an empty list suitable for storing in the repeated field `field`.
    pub fn for_field(field: &FieldDescriptor) -> Result<Self, Error> {
        if field.is_list() {
            Ok(RepeatedField::new(field.kind()))
        } else {
            Err(Error::type_mismatch(
                format_args!("repeated field {}", field.full_name()),
                field.kind(),
            ))
        }
    }

    /// The element type.
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.values.borrow().len()
    }

    /// Returns `true` if the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.values.borrow().is_empty()
    }

    /// Gets the element at `index`, or `None` if it is out of bounds.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.values.borrow().get(index).cloned()
    }

    /// Overwrites the element at `index`.
    ///
    /// Fails with a range error if `index` is not less than [`len`](Self::len).
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<(), Error> {
        let value = self.convert(value.into())?;
        let mut values = self.inner.values.borrow_mut();
        let len = values.len();
        match values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::index_out_of_bounds(index, len)),
        }
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = self.convert(value.into())?;
        self.inner.values.borrow_mut().push(value);
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Option<Value> {
        self.inner.values.borrow_mut().pop()
    }

    /// Removes and returns the first element.
    pub fn shift(&self) -> Option<Value> {
        let mut values = self.inner.values.borrow_mut();
        if values.is_empty() {
            None
        } else {
            Some(values.remove(0))
        }
    }

    /// Inserts an element at the front.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = self.convert(value.into())?;
        self.inner.values.borrow_mut().insert(0, value);
        Ok(())
    }

    /// Truncates the list, or extends it with default elements, so that it has `len` elements.
    ///
    /// Lists of messages are extended with new empty messages.
    pub fn resize(&self, len: usize) {
        let kind = &self.inner.kind;
        self.inner
            .values
            .borrow_mut()
            .resize_with(len, || element_default(kind));
    }

    /// Returns an iterator over a snapshot of the elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Value> {
        self.to_vec().into_iter()
    }

    /// Appends every value yielded by `values`. If any value fails to convert, nothing is
    /// appended.
    pub fn extend<I>(&self, values: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = self.convert_all(values)?;
        self.inner.values.borrow_mut().extend(values);
        Ok(())
    }

    /// Replaces the contents of the list. If any value fails to convert, the list is unchanged.
    pub fn replace<I>(&self, values: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values = self.convert_all(values)?;
        *self.inner.values.borrow_mut() = values;
        Ok(())
    }

    /// Copies the elements into a `Vec`. Messages and containers are copied as handles.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.values.borrow().clone()
    }

    /// Removes every element.
    pub fn clear(&self) {
        self.inner.values.borrow_mut().clear();
    }

    pub(crate) fn with_values<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.inner.values.borrow())
    }

    /// Appends a value already in the element representation.
    pub(crate) fn push_converted(&self, value: Value) {
        self.inner.values.borrow_mut().push(value);
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn eq_at(&self, other: &Self, depth: usize) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.kind() != other.kind() {
            return false;
        }

        let lhs = self.inner.values.borrow();
        let rhs = other.inner.values.borrow();
        lhs.len() == rhs.len() && lhs.iter().zip(rhs.iter()).all(|(l, r)| value_eq(l, r, depth))
    }

    pub(crate) fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth > RECURSION_LIMIT {
            return f.write_str("[...]");
        }

        f.write_str("[")?;
        for (i, value) in self.inner.values.borrow().iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            display::fmt_value(f, value, Some(self.kind()), depth)?;
        }
        f.write_str("]")
    }

    fn convert(&self, value: Value) -> Result<Value, Error> {
        match convert(self.kind(), value)? {
            Value::Message(None) => Err(Error::type_mismatch(self.kind(), "empty message")),
            value => Ok(value),
        }
    }

    fn convert_all<I>(&self, values: I) -> Result<Vec<Value>, Error>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        values
            .into_iter()
            .map(|value| self.convert(value.into()))
            .collect()
    }
}

/// The value of a new element of a list or map. Unlike a singular field, these cannot hold an
/// absent message.
pub(crate) fn element_default(kind: &Kind) -> Value {
    match kind {
        Kind::Message(desc) => Value::Message(Some(Message::new(desc.clone()))),
        kind => Value::default_value(kind),
    }
}

impl PartialEq for RepeatedField {
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(other, 0)
    }
}

impl fmt::Debug for RepeatedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatedField")
            .field("kind", self.kind())
            .field("values", &self.inner.values.borrow())
            .finish()
    }
}

impl fmt::Display for RepeatedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
