use prost::Message as _;
use prost_types::{
    field_descriptor_proto::{Label, Type},
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};

use crate::{
    DescriptorPool, EnumBuilder, ErrorKind, FieldType, FileBuilder, Kind, MessageBuilder,
    OneofBuilder,
};

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_owned()),
        ..field(name, number, Type::Message)
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_owned()),
        field: fields,
        ..Default::default()
    }
}

fn file(name: &str, package: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_owned()),
        package: Some(package.to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: messages,
        ..Default::default()
    }
}

#[test]
fn resolve_message_name() {
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![file(
            "myfile.proto",
            "my.package",
            vec![
                message("MyFieldMessage", vec![]),
                message(
                    "MyMessage",
                    vec![message_field("my_field", 1, "MyFieldMessage")],
                ),
            ],
        )],
    })
    .unwrap();

    let message = pool.get_message_by_name("my.package.MyMessage").unwrap();
    let field = message.get_field_by_name("my_field").unwrap();
    assert_eq!(
        field.kind().as_message().unwrap().full_name(),
        "my.package.MyFieldMessage"
    );
    assert_eq!(field.json_name(), "myField");
}

#[test]
fn resolve_message_name_nested() {
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![file(
            "myfile.proto",
            "my.package",
            vec![DescriptorProto {
                nested_type: vec![message("MyFieldMessage", vec![])],
                ..message(
                    "MyMessage",
                    vec![message_field("my_field", 1, "MyFieldMessage")],
                )
            }],
        )],
    })
    .unwrap();

    let field = pool
        .get_message_by_name("my.package.MyMessage")
        .unwrap()
        .get_field_by_name("my_field")
        .unwrap();
    assert_eq!(
        field.kind().as_message().unwrap().full_name(),
        "my.package.MyMessage.MyFieldMessage"
    );
    assert_eq!(
        field.kind().as_message().unwrap().parent_message().unwrap().name(),
        "MyMessage"
    );
}

#[test]
fn resolve_message_name_other_package() {
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![
            FileDescriptorProto {
                dependency: vec!["other.proto".to_owned()],
                ..file(
                    "myfile.proto",
                    "my.package",
                    vec![message(
                        "MyMessage",
                        vec![
                            message_field("relative", 1, "other.package.Other"),
                            message_field("absolute", 2, ".other.package.Other"),
                        ],
                    )],
                )
            },
            file("other.proto", "other.package", vec![message("Other", vec![])]),
        ],
    })
    .unwrap();

    let message = pool.get_message_by_name("my.package.MyMessage").unwrap();
    for field in message.fields() {
        assert_eq!(
            field.kind().as_message().unwrap().full_name(),
            "other.package.Other"
        );
    }
    assert_eq!(pool.files().len(), 2);
    assert_eq!(
        pool.get_file_by_name("myfile.proto")
            .unwrap()
            .dependencies()
            .map(|f| f.name().to_owned())
            .collect::<Vec<_>>(),
        ["other.proto"]
    );
}

#[test]
fn lookup() {
    let mut builder = FileBuilder::new("lookup.proto");
    builder
        .package("a.b")
        .unwrap()
        .add_enum(EnumBuilder::new("E").value("E_ZERO", 0))
        .unwrap()
        .add_message(MessageBuilder::new("M").field("e", 1, FieldType::Enum("E".to_owned())))
        .unwrap();
    let mut pool = DescriptorPool::new();
    pool.add_builder(&mut builder).unwrap();

    assert!(pool.lookup("a.b.M").unwrap().as_message().is_some());
    assert!(pool.lookup("a.b.E").unwrap().as_enum().is_some());
    assert!(pool.lookup("a.b.M.e").is_none());
    assert!(pool.lookup(".a.b.M").is_some());
    assert!(pool.lookup("a.b.Missing").is_none());
    assert!(pool.get_message_by_name("a.b.E").is_none());

    let field = pool.get_message_by_name("a.b.M").unwrap().get_field(1).unwrap();
    match field.kind() {
        Kind::Enum(desc) => assert_eq!(desc.default_value().name(), "E_ZERO"),
        kind => panic!("unexpected kind {:?}", kind),
    }
}

#[test]
fn failed_batch_rolls_back() {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file("base.proto", "base", vec![message("Base", vec![])]))
        .unwrap();
    let before = pool.clone();

    let err = pool
        .add_file_descriptor_set(FileDescriptorSet {
            file: vec![
                file("good.proto", "good", vec![message("Good", vec![])]),
                file(
                    "bad.proto",
                    "bad",
                    vec![message("Bad", vec![message_field("m", 1, ".nope.Missing")])],
                ),
            ],
        })
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    assert_eq!(err.file(), Some("bad.proto"));
    assert_eq!(pool.files().len(), 1);
    assert!(pool.get_message_by_name("good.Good").is_none());
    assert!(pool.lookup("good").is_none());
    assert!(pool.get_message_by_name("base.Base").is_some());

    // A failed batch leaves the pool usable.
    pool.add_file_descriptor_proto(file("good.proto", "good", vec![message("Good", vec![])]))
        .unwrap();
    assert_eq!(pool.files().len(), 2);
    assert_eq!(before.files().len(), 1);
}

#[test]
fn identical_files_are_skipped() {
    let proto = file("dup.proto", "dup", vec![message("M", vec![])]);
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(proto.clone()).unwrap();
    pool.add_file_descriptor_protos([proto.clone(), proto.clone()])
        .unwrap();
    assert_eq!(pool.files().len(), 1);

    let mut changed = proto;
    changed.message_type.push(message("N", vec![]));
    let err = pool.add_file_descriptor_proto(changed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);
    insta::assert_snapshot!(err, @"a different file named 'dup.proto' has already been added");
}

#[test]
fn decode_file_descriptor_set() {
    let set = FileDescriptorSet {
        file: vec![file("x.proto", "x", vec![message("X", vec![])])],
    };
    let pool = DescriptorPool::decode(set.encode_to_vec().as_slice()).unwrap();
    assert!(pool.get_message_by_name("x.X").is_some());

    let err = DescriptorPool::decode([0x0a, 0xff].as_slice()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    insta::assert_snapshot!(err, @"failed to decode file descriptor set");
}

#[test]
fn validation_errors() {
    fn check(proto: FileDescriptorProto) -> (ErrorKind, String) {
        let err = DescriptorPool::new()
            .add_file_descriptor_proto(proto)
            .unwrap_err();
        (err.kind(), err.to_string())
    }

    let (kind, msg) = check(file(
        "a.proto",
        "a",
        vec![message("M", vec![field("x", 1, Type::Int32), field("y", 1, Type::Int32)])],
    ));
    assert_eq!(kind, ErrorKind::InvalidField);
    insta::assert_snapshot!(msg, @"field number '1' is already used");

    let (kind, msg) = check(file(
        "a.proto",
        "a",
        vec![message("M", vec![field("x", 19_000, Type::Int32)])],
    ));
    assert_eq!(kind, ErrorKind::InvalidField);
    insta::assert_snapshot!(msg, @"invalid field number '19000'");

    let (kind, msg) = check(file("a.proto", "a", vec![message("M", vec![]), message("M", vec![])]));
    assert_eq!(kind, ErrorKind::DuplicateName);
    insta::assert_snapshot!(msg, @"name 'a.M' is defined twice");

    let (kind, msg) = check(file(
        "a.proto",
        "a",
        vec![message("M", vec![message_field("x", 1, "Missing")])],
    ));
    assert_eq!(kind, ErrorKind::UnresolvedReference);
    insta::assert_snapshot!(msg, @"name 'Missing' is not defined");

    let (kind, msg) = check(FileDescriptorProto {
        syntax: Some("proto2".to_owned()),
        ..file(
            "a.proto",
            "a",
            vec![message(
                "M",
                vec![FieldDescriptorProto {
                    label: Some(Label::Required as i32),
                    ..field("x", 1, Type::Int32)
                }],
            )],
        )
    });
    assert_eq!(kind, ErrorKind::Proto2RequiredNotSupported);
    insta::assert_snapshot!(msg, @"field 'a.M.x' is required, which is not supported");

    let (kind, msg) = check(FileDescriptorProto {
        syntax: Some("proto4".to_owned()),
        ..file("a.proto", "a", vec![])
    });
    assert_eq!(kind, ErrorKind::ParseError);
    insta::assert_snapshot!(msg, @"unknown syntax 'proto4'");

    let (kind, msg) = check(FileDescriptorProto {
        enum_type: vec![EnumDescriptorProto {
            name: Some("E".to_owned()),
            value: vec![EnumValueDescriptorProto {
                name: Some("ONE".to_owned()),
                number: Some(1),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..file("a.proto", "a", vec![])
    });
    assert_eq!(kind, ErrorKind::InvalidField);
    insta::assert_snapshot!(msg, @"the first value for proto3 enums must be 0");
}

#[test]
fn proto2_optional_is_accepted() {
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![FileDescriptorProto {
            syntax: Some("proto2".to_owned()),
            ..file(
                "p2.proto",
                "p2",
                vec![message(
                    "M",
                    vec![FieldDescriptorProto {
                        default_value: Some("5".to_owned()),
                        ..field("x", 1, Type::Int32)
                    }],
                )],
            )
        }],
    })
    .unwrap();

    assert!(pool.get_message_by_name("p2.M").unwrap().get_field(1).is_some());
}

#[test]
fn frozen_builder() {
    let mut builder = FileBuilder::new("frozen.proto");
    builder
        .add_message(
            MessageBuilder::new("M")
                .field("x", 1, FieldType::Int32)
                .oneof(OneofBuilder::new("o").field("y", 2, FieldType::String))
                .map("m", 3, FieldType::String, FieldType::Int32),
        )
        .unwrap();

    let mut pool = DescriptorPool::new();
    pool.add_builder(&mut builder).unwrap();
    assert!(builder.is_frozen());
    pool.add_builder(&mut builder).unwrap();
    assert_eq!(pool.files().len(), 1);

    let err = builder.add_message(MessageBuilder::new("N")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FrozenMutation);
    insta::assert_snapshot!(err, @"file 'frozen.proto' has been added to a pool and can no longer be modified");

    let desc = pool.get_message_by_name("M").unwrap();
    let map = desc.get_field_by_name("m").unwrap();
    assert!(map.is_map());
    assert!(!map.is_list());
    let entry = map.kind().as_message().unwrap().clone();
    assert!(entry.is_map_entry());
    assert_eq!(entry.map_entry_key_field().kind(), Kind::String);
    assert_eq!(
        desc.get_field_by_name("y").unwrap().containing_oneof().unwrap().name(),
        "o"
    );
}

#[test]
fn descriptors_are_send_and_sync() {
    fn check<T: Send + Sync>() {}

    check::<DescriptorPool>();
    check::<crate::MessageDescriptor>();
    check::<crate::FieldDescriptor>();
    check::<crate::EnumDescriptor>();
    check::<crate::OneofDescriptor>();
    check::<Kind>();
    check::<crate::DescriptorError>();
    check::<crate::MessageLayout>();
}

#[test]
fn types_must_be_imported() {
    let dep = file("dep.proto", "dep", vec![message("Dep", vec![])]);
    let user = file(
        "user.proto",
        "user",
        vec![message("User", vec![message_field("d", 1, ".dep.Dep")])],
    );

    let err = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![dep.clone(), user.clone()],
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    insta::assert_snapshot!(err, @"name 'dep.Dep' is not defined");
    assert_eq!(err.file(), Some("user.proto"));
    assert_eq!(err.path(), Some(&[4, 0, 2, 0, 6][..]));

    // A public import of an import is visible too.
    let middle = FileDescriptorProto {
        dependency: vec!["dep.proto".to_owned()],
        public_dependency: vec![0],
        ..file("middle.proto", "middle", vec![])
    };
    let user = FileDescriptorProto {
        dependency: vec!["middle.proto".to_owned()],
        ..user
    };
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![user, middle, dep],
    })
    .unwrap();
    let field = pool.get_message_by_name("user.User").unwrap().get_field(1).unwrap();
    assert_eq!(field.kind().as_message().unwrap().full_name(), "dep.Dep");
}

#[test]
fn missing_import() {
    let err = DescriptorPool::new()
        .add_file_descriptor_proto(FileDescriptorProto {
            dependency: vec!["gone.proto".to_owned()],
            ..file("a.proto", "a", vec![])
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    insta::assert_snapshot!(err, @"imported file 'gone.proto' has not been added");
    assert_eq!(err.path(), Some(&[3, 0][..]));
}

#[test]
fn enum_aliases() {
    fn enum_file(allow_alias: bool) -> FileDescriptorProto {
        let value = |name: &str, number| EnumValueDescriptorProto {
            name: Some(name.to_owned()),
            number: Some(number),
            ..Default::default()
        };
        FileDescriptorProto {
            enum_type: vec![EnumDescriptorProto {
                name: Some("E".to_owned()),
                value: vec![value("ZERO", 0), value("ONE", 1), value("UNO", 1)],
                options: Some(prost_types::EnumOptions {
                    allow_alias: Some(allow_alias),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..file("e.proto", "e", vec![])
        }
    }

    let err = DescriptorPool::new()
        .add_file_descriptor_proto(enum_file(false))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidField);
    insta::assert_snapshot!(err, @"enum number '1' has already been used");

    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(enum_file(true)).unwrap();
    let desc = pool.get_enum_by_name("e.E").unwrap();
    assert_eq!(desc.get_value(1).unwrap().name(), "ONE");
    assert_eq!(desc.get_value_by_name("UNO").unwrap().number(), 1);
    assert_eq!(desc.get_value_by_name("UNO").unwrap().full_name(), "e.UNO");
    assert!(desc.get_value(2).is_none());
    assert_eq!(desc.values().len(), 3);
}

#[test]
fn file_contents() {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file("one.proto", "one", vec![message("A", vec![])]))
        .unwrap();
    pool.add_file_descriptor_proto(file(
        "two.proto",
        "two",
        vec![
            DescriptorProto {
                nested_type: vec![message("Inner", vec![])],
                ..message("B", vec![])
            },
            message("C", vec![]),
        ],
    ))
    .unwrap();

    let two = pool.get_file_by_name("two.proto").unwrap();
    assert_eq!(two.index(), 1);
    let names: Vec<_> = two.messages().map(|m| m.full_name().to_owned()).collect();
    assert_eq!(names, ["two.B", "two.C"]);
    assert_eq!(pool.messages().len(), 4);

    let inner = pool.get_message_by_name("two.B.Inner").unwrap();
    assert_eq!(inner.parent_file(), two);
    assert_eq!(inner.package_name(), "two");
    assert_eq!(inner.descriptor_proto().name(), "Inner");
    assert_eq!(
        pool.find_message_by_descriptor_pointer(inner.id()),
        Some(inner.clone())
    );
}
