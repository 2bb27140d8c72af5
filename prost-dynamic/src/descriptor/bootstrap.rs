use once_cell::sync::Lazy;

use crate::{
    descriptor::builder::{EnumBuilder, FieldType, FileBuilder, MessageBuilder, OneofBuilder},
    DescriptorError, DescriptorPool, Syntax,
};

static BOOTSTRAP: Lazy<DescriptorPool> =
    Lazy::new(|| build_pool().expect("bootstrap descriptor.proto is valid"));

impl DescriptorPool {
    /// Gets a pool containing `google/protobuf/descriptor.proto`, so that descriptor sets can
    /// themselves be decoded and inspected as dynamic messages.
    ///
    /// Only the parts needed to describe messages and enums are included. Services, source code
    /// info and most options are omitted, and are skipped as unknown fields when decoding.
    ///
    /// The pool is built once per process. The returned value is a cheap clone, and adding files
    /// to it does not affect later calls.
    pub fn bootstrap() -> DescriptorPool {
        BOOTSTRAP.clone()
    }
}

fn build_pool() -> Result<DescriptorPool, DescriptorError> {
    use FieldType::*;

    fn message(name: &str) -> FieldType {
        Message(name.to_owned())
    }

    let file_descriptor_set =
        MessageBuilder::new("FileDescriptorSet").repeated("file", 1, message("FileDescriptorProto"));

    let file_descriptor_proto = MessageBuilder::new("FileDescriptorProto")
        .field("name", 1, String)
        .field("package", 2, String)
        .repeated("dependency", 3, String)
        .repeated("public_dependency", 10, Int32)
        .repeated("weak_dependency", 11, Int32)
        .repeated("message_type", 4, message("DescriptorProto"))
        .repeated("enum_type", 5, message("EnumDescriptorProto"))
        .repeated("extension", 7, message("FieldDescriptorProto"))
        .field("options", 8, message("FileOptions"))
        .field("syntax", 12, String);

    let file_options = MessageBuilder::new("FileOptions")
        .field("java_package", 1, String)
        .field("go_package", 11, String)
        .field("deprecated", 23, Bool);

    let descriptor_proto = MessageBuilder::new("DescriptorProto")
        .field("name", 1, String)
        .repeated("field", 2, message("FieldDescriptorProto"))
        .repeated("extension", 6, message("FieldDescriptorProto"))
        .repeated("nested_type", 3, message("DescriptorProto"))
        .repeated("enum_type", 4, message("EnumDescriptorProto"))
        .repeated("extension_range", 5, message("ExtensionRange"))
        .repeated("oneof_decl", 8, message("OneofDescriptorProto"))
        .field("options", 7, message("MessageOptions"))
        .repeated("reserved_range", 9, message("ReservedRange"))
        .repeated("reserved_name", 10, String)
        .nested_message(range("ExtensionRange"))
        .nested_message(range("ReservedRange"));

    let message_options = MessageBuilder::new("MessageOptions")
        .field("deprecated", 3, Bool)
        .field("map_entry", 7, Bool);

    let field_descriptor_proto = MessageBuilder::new("FieldDescriptorProto")
        .field("name", 1, String)
        .field("number", 3, Int32)
        .field("label", 4, Enum("Label".to_owned()))
        .field("type", 5, Enum("Type".to_owned()))
        .field("type_name", 6, String)
        .field("extendee", 2, String)
        .field("default_value", 7, String)
        .field("json_name", 10, String)
        .field("options", 8, message("FieldOptions"))
        .field("proto3_optional", 17, Bool)
        // An index of 0 is meaningful, so it must be written even though it is the default.
        .oneof(OneofBuilder::new("_oneof_index").field("oneof_index", 9, Int32))
        .nested_enum(
            EnumBuilder::new("Type")
                .value("TYPE_DOUBLE", 1)
                .value("TYPE_FLOAT", 2)
                .value("TYPE_INT64", 3)
                .value("TYPE_UINT64", 4)
                .value("TYPE_INT32", 5)
                .value("TYPE_FIXED64", 6)
                .value("TYPE_FIXED32", 7)
                .value("TYPE_BOOL", 8)
                .value("TYPE_STRING", 9)
                .value("TYPE_GROUP", 10)
                .value("TYPE_MESSAGE", 11)
                .value("TYPE_BYTES", 12)
                .value("TYPE_UINT32", 13)
                .value("TYPE_ENUM", 14)
                .value("TYPE_SFIXED32", 15)
                .value("TYPE_SFIXED64", 16)
                .value("TYPE_SINT32", 17)
                .value("TYPE_SINT64", 18),
        )
        .nested_enum(
            EnumBuilder::new("Label")
                .value("LABEL_OPTIONAL", 1)
                .value("LABEL_REQUIRED", 2)
                .value("LABEL_REPEATED", 3),
        );

    let field_options = MessageBuilder::new("FieldOptions")
        .field("packed", 2, Bool)
        .field("deprecated", 3, Bool);

    let oneof_descriptor_proto = MessageBuilder::new("OneofDescriptorProto").field("name", 1, String);

    let enum_descriptor_proto = MessageBuilder::new("EnumDescriptorProto")
        .field("name", 1, String)
        .repeated("value", 2, message("EnumValueDescriptorProto"))
        .field("options", 3, message("EnumOptions"))
        .repeated("reserved_range", 4, message("EnumReservedRange"))
        .repeated("reserved_name", 5, String)
        .nested_message(range("EnumReservedRange"));

    let enum_options = MessageBuilder::new("EnumOptions")
        .field("allow_alias", 2, Bool)
        .field("deprecated", 3, Bool);

    let enum_value_descriptor_proto = MessageBuilder::new("EnumValueDescriptorProto")
        .field("name", 1, String)
        .field("number", 2, Int32);

    // Type and Label start at 1, which proto3 does not allow.
    let mut file = FileBuilder::new("google/protobuf/descriptor.proto");
    file.package("google.protobuf")?
        .syntax(Syntax::Proto2)?
        .add_message(file_descriptor_set)?
        .add_message(file_descriptor_proto)?
        .add_message(file_options)?
        .add_message(descriptor_proto)?
        .add_message(message_options)?
        .add_message(field_descriptor_proto)?
        .add_message(field_options)?
        .add_message(oneof_descriptor_proto)?
        .add_message(enum_descriptor_proto)?
        .add_message(enum_options)?
        .add_message(enum_value_descriptor_proto)?;

    let mut pool = DescriptorPool::new();
    pool.add_builder(&mut file)?;
    Ok(pool)
}

fn range(name: &str) -> MessageBuilder {
    MessageBuilder::new(name)
        .field("start", 1, FieldType::Int32)
        .field("end", 2, FieldType::Int32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kind;

    #[test]
    fn bootstrap_types() {
        let pool = DescriptorPool::bootstrap();
        let field = pool
            .get_message_by_name("google.protobuf.FieldDescriptorProto")
            .unwrap();

        let ty = field.get_field_by_name("type").unwrap();
        let Kind::Enum(ty) = ty.kind() else {
            panic!("expected enum")
        };
        assert_eq!(ty.full_name(), "google.protobuf.FieldDescriptorProto.Type");
        assert_eq!(ty.get_value(9).unwrap().name(), "TYPE_STRING");

        assert!(pool
            .get_message_by_name("google.protobuf.DescriptorProto.ExtensionRange")
            .is_some());
        assert_eq!(
            field.get_field_by_name("json_name").unwrap().json_name(),
            "jsonName"
        );
    }

    #[test]
    fn first_oneof_survives_round_trip() {
        use prost::Message as _;
        use prost_types::{
            field_descriptor_proto::Type, DescriptorProto, FieldDescriptorProto,
            FileDescriptorProto, FileDescriptorSet, OneofDescriptorProto,
        };

        let set = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("o.proto".to_owned()),
                syntax: Some("proto3".to_owned()),
                message_type: vec![DescriptorProto {
                    name: Some("M".to_owned()),
                    field: vec![
                        FieldDescriptorProto {
                            name: Some("a".to_owned()),
                            number: Some(1),
                            r#type: Some(Type::Int32 as i32),
                            oneof_index: Some(0),
                            ..Default::default()
                        },
                        FieldDescriptorProto {
                            name: Some("b".to_owned()),
                            number: Some(2),
                            r#type: Some(Type::Int32 as i32),
                            ..Default::default()
                        },
                    ],
                    oneof_decl: vec![OneofDescriptorProto {
                        name: Some("o".to_owned()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        let desc = DescriptorPool::bootstrap()
            .get_message_by_name("google.protobuf.FileDescriptorSet")
            .unwrap();
        let dynamic = crate::Message::decode(desc, set.encode_to_vec().as_slice()).unwrap();
        let bytes = dynamic.encode_to_vec().unwrap();

        let round_tripped = FileDescriptorSet::decode(bytes.as_slice()).unwrap();
        let fields = &round_tripped.file[0].message_type[0].field;
        assert_eq!(fields[0].oneof_index, Some(0));
        assert_eq!(fields[1].oneof_index, None);

        let pool = DescriptorPool::decode(bytes.as_slice()).unwrap();
        let m = pool.get_message_by_name("M").unwrap();
        let a = m.get_field_by_name("a").unwrap();
        assert_eq!(a.containing_oneof().unwrap().name(), "o");
        assert!(m.get_field_by_name("b").unwrap().containing_oneof().is_none());
    }

    #[test]
    fn bootstrap_is_shared() {
        assert_eq!(DescriptorPool::bootstrap(), DescriptorPool::bootstrap());
    }
}
