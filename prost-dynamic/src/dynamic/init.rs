use crate::{
    Error, FieldDescriptor, Kind, MapField, Message, MessageDescriptor, RepeatedField, Value,
};

/// A nested description of a field value, used to build a whole message tree at once with
/// [`Message::from_fields`].
///
/// # Examples
///
/// ```
/// # use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, Initializer, Message, MessageBuilder};
/// let mut file = FileBuilder::new("example.proto");
/// file.add_message(
///     MessageBuilder::new("Person")
///         .field("name", 1, FieldType::String)
///         .repeated("friends", 2, FieldType::Message("Person".to_owned())),
/// )?;
/// let mut pool = DescriptorPool::new();
/// pool.add_builder(&mut file)?;
///
/// let person = Message::from_fields(
///     pool.get_message_by_name("Person").unwrap(),
///     [
///         ("name", Initializer::from("Kim")),
///         (
///             "friends",
///             Initializer::List(vec![Initializer::Fields(vec![(
///                 "name".to_owned(),
///                 Initializer::from("Lee"),
///             )])]),
///         ),
///     ],
/// )?;
/// assert_eq!(person.to_string(), r#"Person { name: "Kim", friends: [Person { name: "Lee" }] }"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub enum Initializer {
    /// A value, converted to the field type. Lists and maps given this way are copied.
    Value(Value),
    /// A new message of the field type, built from the named fields.
    Fields(Vec<(String, Initializer)>),
    /// The elements of a repeated field.
    List(Vec<Initializer>),
    /// The entries of a map field.
    Entries(Vec<(Value, Initializer)>),
}

impl Message {
    /// Creates a message of type `desc` with the given fields set.
    ///
    /// Fails if any field does not exist, or if any value cannot be converted to its field type.
    pub fn from_fields<I, K>(desc: MessageDescriptor, fields: I) -> Result<Message, Error>
    where
        I: IntoIterator<Item = (K, Initializer)>,
        K: AsRef<str>,
    {
        let message = Message::new(desc);
        for (name, init) in fields {
            let field = message.descriptor().get_field_by_name(name.as_ref()).ok_or_else(|| {
                Error::unknown_field(message.descriptor().full_name(), name.as_ref())
            })?;
            let value = init.build_field(&field)?;
            message.set(&field, value)?;
        }
        Ok(message)
    }
}

impl Initializer {
    fn build_field(self, field: &FieldDescriptor) -> Result<Value, Error> {
        if field.is_map() {
            let map = MapField::for_field(field)?;
            match self {
                Initializer::Entries(entries) => {
                    for (key, value) in entries {
                        let value = value.build_element(map.value_kind())?;
                        map.set_value(key, value)?;
                    }
                }
                Initializer::Value(Value::Map(source)) => map.merge(&source)?,
                init => return Err(Error::type_mismatch("map entries", init.name())),
            }
            Ok(Value::Map(map))
        } else if field.is_list() {
            let list = RepeatedField::for_field(field)?;
            match self {
                Initializer::List(items) => {
                    let items = items
                        .into_iter()
                        .map(|item| item.build_element(list.kind()))
                        .collect::<Result<Vec<_>, _>>()?;
                    list.extend(items)?;
                }
                Initializer::Value(Value::List(source)) => list.extend(source.iter())?,
                init => return Err(Error::type_mismatch("list", init.name())),
            }
            Ok(Value::List(list))
        } else {
            self.build_element(&field.kind())
        }
    }

    fn build_element(self, kind: &Kind) -> Result<Value, Error> {
        match (self, kind) {
            (Initializer::Value(value), _) => Ok(value),
            (Initializer::Fields(fields), Kind::Message(desc)) => {
                Message::from_fields(desc.clone(), fields).map(Value::from)
            }
            (init, kind) => Err(Error::type_mismatch(kind, init.name())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Initializer::Value(value) => value.type_name(),
            Initializer::Fields(_) => "fields",
            Initializer::List(_) => "list",
            Initializer::Entries(_) => "entries",
        }
    }
}

impl From<Value> for Initializer {
    fn from(value: Value) -> Self {
        Initializer::Value(value)
    }
}

impl From<&str> for Initializer {
    fn from(value: &str) -> Self {
        Initializer::Value(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DescriptorPool, ErrorKind, FieldType, FileBuilder, MessageBuilder};

    fn desc() -> MessageDescriptor {
        let mut file = FileBuilder::new("init.proto");
        file.add_message(
            MessageBuilder::new("Node")
                .field("id", 1, FieldType::Int32)
                .field("parent", 2, FieldType::Message("Node".to_owned()))
                .repeated("ids", 3, FieldType::Uint32)
                .map("labels", 4, FieldType::Int32, FieldType::String),
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_builder(&mut file).unwrap();
        pool.get_message_by_name("Node").unwrap()
    }

    #[test]
    fn nested() {
        let message = Message::from_fields(
            desc(),
            [
                ("id", Initializer::Value(Value::I32(1))),
                (
                    "parent",
                    Initializer::Fields(vec![("id".to_owned(), Value::I32(2).into())]),
                ),
                (
                    "ids",
                    Initializer::List(vec![Value::U32(3).into(), Value::I32(4).into()]),
                ),
                (
                    "labels",
                    Initializer::Entries(vec![(Value::I32(5), "five".into())]),
                ),
            ],
        )
        .unwrap();

        assert_eq!(
            message.to_string(),
            r#"Node { id: 1, parent: Node { id: 2 }, ids: [3, 4], labels: {5: "five"} }"#
        );
    }

    #[test]
    fn lists_are_copied() {
        let desc = desc();
        let first = Message::from_fields(
            desc.clone(),
            [("ids", Initializer::List(vec![Value::U32(1).into()]))],
        )
        .unwrap();
        let ids = first.get("ids").unwrap();

        let second = Message::from_fields(desc, [("ids", Initializer::Value(ids.clone()))]).unwrap();
        ids.as_list().unwrap().push(2u32).unwrap();
        assert_eq!(second.get("ids").unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn errors() {
        let err = Message::from_fields(desc(), [("nope", Initializer::from(Value::I32(1)))])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let err = Message::from_fields(
            desc(),
            [(
                "parent",
                Initializer::Fields(vec![("nope".to_owned(), Value::I32(1).into())]),
            )],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let err = Message::from_fields(desc(), [("id", Initializer::List(vec![]))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = Message::from_fields(
            desc(),
            [("ids", Initializer::List(vec![Value::I32(-1).into()]))],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }
}
