use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto,
};

use crate::descriptor::{
    paths, to_index, EnumIndex, EnumValueIndex, FieldIndex, FileIndex, MessageIndex, OneofIndex,
    Origin,
};

/// One definition from a batch of files.
///
/// Nodes are produced in pre-order: a file before its types, a message before its oneofs,
/// fields and nested types, and an enum before its values. Message and enum indexes are
/// assigned in that same order.
pub(super) struct Node<'a> {
    pub(super) file: FileIndex,
    pub(super) path: Box<[i32]>,
    pub(super) full_name: String,
    pub(super) item: Item<'a>,
}

#[derive(Clone, Copy)]
pub(super) enum Item<'a> {
    File(&'a FileDescriptorProto),
    Message {
        proto: &'a DescriptorProto,
        parent: Option<MessageIndex>,
        index: MessageIndex,
    },
    Oneof {
        message: MessageIndex,
        index: OneofIndex,
    },
    Field {
        proto: &'a FieldDescriptorProto,
        owner: &'a DescriptorProto,
        message: MessageIndex,
        index: FieldIndex,
    },
    Enum {
        proto: &'a EnumDescriptorProto,
        parent: Option<MessageIndex>,
        index: EnumIndex,
    },
    EnumValue {
        proto: &'a EnumValueDescriptorProto,
        owner: &'a EnumDescriptorProto,
        enum_: EnumIndex,
        index: EnumValueIndex,
    },
    /// Services and extensions, which are accepted but not loaded.
    Unsupported(&'static str),
}

/// The number of files, messages and enums already in the pool.
#[derive(Clone, Copy)]
pub(super) struct Counts {
    pub(super) files: FileIndex,
    pub(super) messages: MessageIndex,
    pub(super) enums: EnumIndex,
}

pub(super) fn flatten(batch: &[FileDescriptorProto], start: Counts) -> Vec<Node<'_>> {
    let mut flattener = Flattener {
        nodes: Vec::new(),
        next: start,
        file: start.files,
    };
    for file in batch {
        flattener.file(file);
    }
    flattener.nodes
}

impl Node<'_> {
    pub(super) fn origin(&self) -> Origin {
        Origin::new(self.file, &self.path)
    }

    /// The origin of a part of this definition, such as its name or number.
    pub(super) fn origin_of(&self, suffix: &[i32]) -> Origin {
        let mut path = self.path.to_vec();
        path.extend_from_slice(suffix);
        Origin {
            file: self.file,
            path: path.into_boxed_slice(),
        }
    }

    /// The name of the scope this definition was declared in.
    pub(super) fn scope(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or("", |(scope, _)| scope)
    }
}

struct Flattener<'a> {
    nodes: Vec<Node<'a>>,
    next: Counts,
    file: FileIndex,
}

impl<'a> Flattener<'a> {
    fn push(&mut self, path: Box<[i32]>, full_name: String, item: Item<'a>) {
        self.nodes.push(Node {
            file: self.file,
            path,
            full_name,
            item,
        });
    }

    fn file(&mut self, proto: &'a FileDescriptorProto) {
        self.file = self.next.files;
        self.next.files += 1;

        let package = proto.package();
        self.push(Box::default(), package.to_owned(), Item::File(proto));

        for (i, message) in proto.message_type.iter().enumerate() {
            self.message(child(&[], paths::FILE_MESSAGE_TYPE, i), package, None, message);
        }
        for (i, enum_) in proto.enum_type.iter().enumerate() {
            self.enum_(child(&[], paths::FILE_ENUM_TYPE, i), package, None, enum_);
        }
        for (i, service) in proto.service.iter().enumerate() {
            let path = child(&[], paths::FILE_SERVICE, i);
            self.push(path, qualify(package, service.name()), Item::Unsupported("service"));
        }
        for (i, extension) in proto.extension.iter().enumerate() {
            let path = child(&[], paths::FILE_EXTENSION, i);
            self.push(path, qualify(package, extension.name()), Item::Unsupported("extension"));
        }
    }

    fn message(
        &mut self,
        path: Box<[i32]>,
        scope: &str,
        parent: Option<MessageIndex>,
        proto: &'a DescriptorProto,
    ) {
        let index = self.next.messages;
        self.next.messages += 1;
        let full_name = qualify(scope, proto.name());
        self.push(
            path.clone(),
            full_name.clone(),
            Item::Message {
                proto,
                parent,
                index,
            },
        );

        for (i, oneof) in proto.oneof_decl.iter().enumerate() {
            self.push(
                child(&path, paths::MESSAGE_ONEOF_DECL, i),
                qualify(&full_name, oneof.name()),
                Item::Oneof {
                    message: index,
                    index: to_index(i),
                },
            );
        }
        for (i, field) in proto.field.iter().enumerate() {
            self.push(
                child(&path, paths::MESSAGE_FIELD, i),
                qualify(&full_name, field.name()),
                Item::Field {
                    proto: field,
                    owner: proto,
                    message: index,
                    index: to_index(i),
                },
            );
        }
        for (i, nested) in proto.nested_type.iter().enumerate() {
            let nested_path = child(&path, paths::MESSAGE_NESTED_TYPE, i);
            self.message(nested_path, &full_name, Some(index), nested);
        }
        for (i, enum_) in proto.enum_type.iter().enumerate() {
            let enum_path = child(&path, paths::MESSAGE_ENUM_TYPE, i);
            self.enum_(enum_path, &full_name, Some(index), enum_);
        }
        for (i, extension) in proto.extension.iter().enumerate() {
            self.push(
                child(&path, paths::MESSAGE_EXTENSION, i),
                qualify(&full_name, extension.name()),
                Item::Unsupported("extension"),
            );
        }
    }

    fn enum_(
        &mut self,
        path: Box<[i32]>,
        scope: &str,
        parent: Option<MessageIndex>,
        proto: &'a EnumDescriptorProto,
    ) {
        let index = self.next.enums;
        self.next.enums += 1;
        self.push(
            path.clone(),
            qualify(scope, proto.name()),
            Item::Enum {
                proto,
                parent,
                index,
            },
        );

        // Values are declared in the scope enclosing the enum.
        for (i, value) in proto.value.iter().enumerate() {
            self.push(
                child(&path, paths::ENUM_VALUE, i),
                qualify(scope, value.name()),
                Item::EnumValue {
                    proto: value,
                    owner: proto,
                    enum_: index,
                    index: to_index(i),
                },
            );
        }
    }
}

fn child(path: &[i32], tag: i32, index: usize) -> Box<[i32]> {
    let mut path = path.to_vec();
    path.extend([tag, index as i32]);
    path.into_boxed_slice()
}

pub(super) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{scope}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_pre_order() {
        let file = FileDescriptorProto {
            name: Some("f.proto".to_owned()),
            package: Some("pkg".to_owned()),
            message_type: vec![DescriptorProto {
                name: Some("Outer".to_owned()),
                field: vec![FieldDescriptorProto {
                    name: Some("x".to_owned()),
                    ..Default::default()
                }],
                nested_type: vec![DescriptorProto {
                    name: Some("Inner".to_owned()),
                    ..Default::default()
                }],
                enum_type: vec![EnumDescriptorProto {
                    name: Some("E".to_owned()),
                    value: vec![EnumValueDescriptorProto {
                        name: Some("ZERO".to_owned()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let start = Counts {
            files: 2,
            messages: 5,
            enums: 1,
        };

        let nodes = flatten(std::slice::from_ref(&file), start);
        let names: Vec<_> = nodes.iter().map(|n| n.full_name.as_str()).collect();
        assert_eq!(
            names,
            ["pkg", "pkg.Outer", "pkg.Outer.x", "pkg.Outer.Inner", "pkg.Outer.E", "pkg.Outer.ZERO"]
        );
        assert!(nodes.iter().all(|n| n.file == 2));
        assert!(matches!(nodes[3].item, Item::Message { index: 6, parent: Some(5), .. }));
        assert!(matches!(nodes[4].item, Item::Enum { index: 1, .. }));
        assert_eq!(&*nodes[5].path, [4, 0, 4, 0, 2, 0]);
        assert_eq!(nodes[2].scope(), "pkg.Outer");
    }
}
