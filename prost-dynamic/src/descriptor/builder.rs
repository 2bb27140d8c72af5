//! Defining descriptors in code.
//!
//! A [`FileBuilder`] assembles a [`FileDescriptorProto`] from message, oneof and enum builders.
//! Once it has been added to a pool with [`DescriptorPool::add_builder`] it is frozen, and any
//! further attempt to modify it fails with [`ErrorKind::FrozenMutation`][crate::ErrorKind].

use prost_types::{
    field_descriptor_proto::{Label, Type},
    DescriptorProto, EnumDescriptorProto, EnumOptions, EnumValueDescriptorProto,
    FieldDescriptorProto, FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};

use crate::{DescriptorError, DescriptorPool, Syntax};

/// Builds a single proto file.
///
/// # Examples
///
/// ```
/// # use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, MessageBuilder};
/// let mut file = FileBuilder::new("person.proto");
/// file.package("example")?.add_message(
///     MessageBuilder::new("Person")
///         .field("name", 1, FieldType::String)
///         .field("age", 2, FieldType::Int32),
/// )?;
///
/// let mut pool = DescriptorPool::new();
/// pool.add_builder(&mut file)?;
/// assert!(pool.get_message_by_name("example.Person").is_some());
/// assert!(file.package("other").is_err());
/// # Ok::<(), prost_dynamic::DescriptorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileBuilder {
    proto: FileDescriptorProto,
    frozen: bool,
}

/// Builds a message type. Fields are added in definition order.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    proto: DescriptorProto,
}

/// Builds a oneof within a message.
#[derive(Debug, Clone)]
pub struct OneofBuilder {
    name: String,
    fields: Vec<FieldDescriptorProto>,
}

/// Builds an enum type.
#[derive(Debug, Clone)]
pub struct EnumBuilder {
    proto: EnumDescriptorProto,
}

/// The declared type of a field added through a [`MessageBuilder`].
///
/// Message and enum type names may be fully qualified with a leading `.`, or relative to the
/// scope of the field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FieldType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String),
    Enum(String),
}

impl FileBuilder {
    /// Creates a builder for a `proto3` file with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        FileBuilder {
            proto: FileDescriptorProto {
                name: Some(name.into()),
                syntax: Some("proto3".to_owned()),
                ..Default::default()
            },
            frozen: false,
        }
    }

    /// Sets the package name, e.g. `my.package`.
    pub fn package(&mut self, package: impl Into<String>) -> Result<&mut Self, DescriptorError> {
        self.check_frozen()?;
        self.proto.package = Some(package.into());
        Ok(self)
    }

    /// Sets the syntax of the file.
    pub fn syntax(&mut self, syntax: Syntax) -> Result<&mut Self, DescriptorError> {
        self.check_frozen()?;
        self.proto.syntax = Some(
            match syntax {
                Syntax::Proto2 => "proto2",
                Syntax::Proto3 => "proto3",
            }
            .to_owned(),
        );
        Ok(self)
    }

    /// Adds an import of another file by name.
    pub fn add_dependency(&mut self, name: impl Into<String>) -> Result<&mut Self, DescriptorError> {
        self.check_frozen()?;
        self.proto.dependency.push(name.into());
        Ok(self)
    }

    /// Adds a top-level message type.
    pub fn add_message(&mut self, message: MessageBuilder) -> Result<&mut Self, DescriptorError> {
        self.check_frozen()?;
        self.proto.message_type.push(message.proto);
        Ok(self)
    }

    /// Adds a top-level enum type.
    pub fn add_enum(&mut self, enum_: EnumBuilder) -> Result<&mut Self, DescriptorError> {
        self.check_frozen()?;
        self.proto.enum_type.push(enum_.proto);
        Ok(self)
    }

    /// Returns `true` once this builder has been added to a pool.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Gets the file descriptor described by this builder.
    pub fn build(&self) -> FileDescriptorProto {
        self.proto.clone()
    }

    fn check_frozen(&self) -> Result<(), DescriptorError> {
        if self.frozen {
            Err(DescriptorError::frozen_builder(self.proto.name()))
        } else {
            Ok(())
        }
    }
}

impl MessageBuilder {
    /// Creates a builder for a message type with the given short name.
    pub fn new(name: impl Into<String>) -> Self {
        MessageBuilder {
            proto: DescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
        }
    }

    /// Adds a singular field.
    pub fn field(mut self, name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        self.proto
            .field
            .push(new_field(name.into(), number, Label::Optional, &ty));
        self
    }

    /// Adds a repeated field.
    pub fn repeated(mut self, name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        self.proto
            .field
            .push(new_field(name.into(), number, Label::Repeated, &ty));
        self
    }

    /// Adds a map field, generating its entry type as a nested message named after the field.
    pub fn map(
        mut self,
        name: impl Into<String>,
        number: u32,
        key: FieldType,
        value: FieldType,
    ) -> Self {
        let name = name.into();
        let entry_name = map_entry_name(&name);

        self.proto.nested_type.push(DescriptorProto {
            name: Some(entry_name.clone()),
            field: vec![
                new_field("key".to_owned(), 1, Label::Optional, &key),
                new_field("value".to_owned(), 2, Label::Optional, &value),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        self.proto.field.push(new_field(
            name,
            number,
            Label::Repeated,
            &FieldType::Message(entry_name),
        ));
        self
    }

    /// Adds a oneof and all of its member fields.
    pub fn oneof(mut self, oneof: OneofBuilder) -> Self {
        let index = self.proto.oneof_decl.len() as i32;
        self.proto.oneof_decl.push(OneofDescriptorProto {
            name: Some(oneof.name),
            options: None,
        });
        self.proto
            .field
            .extend(oneof.fields.into_iter().map(|mut field| {
                field.oneof_index = Some(index);
                field
            }));
        self
    }

    /// Adds a message type nested inside this one.
    pub fn nested_message(mut self, message: MessageBuilder) -> Self {
        self.proto.nested_type.push(message.proto);
        self
    }

    /// Adds an enum type nested inside this message.
    pub fn nested_enum(mut self, enum_: EnumBuilder) -> Self {
        self.proto.enum_type.push(enum_.proto);
        self
    }
}

impl OneofBuilder {
    /// Creates a builder for a oneof with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        OneofBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a member field.
    pub fn field(mut self, name: impl Into<String>, number: u32, ty: FieldType) -> Self {
        self.fields
            .push(new_field(name.into(), number, Label::Optional, &ty));
        self
    }
}

impl EnumBuilder {
    /// Creates a builder for an enum type with the given short name.
    pub fn new(name: impl Into<String>) -> Self {
        EnumBuilder {
            proto: EnumDescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
        }
    }

    /// Adds a value.
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.proto.value.push(EnumValueDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            options: None,
        });
        self
    }

    /// Allows several values to share a number.
    pub fn allow_alias(mut self) -> Self {
        self.proto
            .options
            .get_or_insert_with(EnumOptions::default)
            .allow_alias = Some(true);
        self
    }
}

impl DescriptorPool {
    /// Adds the file described by `builder` to this pool, then freezes the builder.
    ///
    /// Adding a builder that was already added is a no-op, since its file is unchanged.
    pub fn add_builder(&mut self, builder: &mut FileBuilder) -> Result<(), DescriptorError> {
        self.add_file_descriptor_proto(builder.build())?;
        builder.frozen = true;
        Ok(())
    }
}

impl FieldType {
    fn ty(&self) -> Type {
        match self {
            FieldType::Double => Type::Double,
            FieldType::Float => Type::Float,
            FieldType::Int32 => Type::Int32,
            FieldType::Int64 => Type::Int64,
            FieldType::Uint32 => Type::Uint32,
            FieldType::Uint64 => Type::Uint64,
            FieldType::Sint32 => Type::Sint32,
            FieldType::Sint64 => Type::Sint64,
            FieldType::Fixed32 => Type::Fixed32,
            FieldType::Fixed64 => Type::Fixed64,
            FieldType::Sfixed32 => Type::Sfixed32,
            FieldType::Sfixed64 => Type::Sfixed64,
            FieldType::Bool => Type::Bool,
            FieldType::String => Type::String,
            FieldType::Bytes => Type::Bytes,
            FieldType::Message(_) => Type::Message,
            FieldType::Enum(_) => Type::Enum,
        }
    }

    fn type_name(&self) -> Option<String> {
        match self {
            FieldType::Message(name) | FieldType::Enum(name) => Some(name.clone()),
            _ => None,
        }
    }
}

fn new_field(name: String, number: u32, label: Label, ty: &FieldType) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name),
        number: Some(number as i32),
        label: Some(label as i32),
        r#type: Some(ty.ty() as i32),
        type_name: ty.type_name(),
        ..Default::default()
    }
}

/// `my_field` becomes `MyFieldEntry`, matching the name protoc generates.
fn map_entry_name(field_name: &str) -> String {
    let mut result = String::with_capacity(field_name.len() + 5);
    let mut uppercase_next = true;
    for ch in field_name.chars() {
        if ch == '_' {
            uppercase_next = true;
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }
    result.push_str("Entry");
    result
}
