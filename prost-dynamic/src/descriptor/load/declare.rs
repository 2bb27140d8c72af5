use std::collections::{hash_map::Entry, BTreeMap, HashMap, HashSet};

use prost_types::{EnumDescriptorProto, EnumValueDescriptorProto, FileDescriptorProto};

use crate::descriptor::{
    error::Problem,
    load::flatten::{Item, Node},
    paths, EnumEntry, EnumIndex, EnumValueEntry, EnumValueIndex, FileEntry, MessageEntry,
    MessageIndex, OneofEntry, Origin, PoolData, QualifiedName, Symbol, Syntax, Target,
};
use crate::ErrorKind;

impl PoolData {
    /// Publishes the name of every definition in the batch and allocates its entry. Nothing
    /// here depends on names declared later in the batch.
    pub(super) fn declare(&mut self, nodes: &[Node<'_>], problems: &mut Vec<Problem>) {
        for node in nodes {
            match node.item {
                Item::File(proto) => self.declare_file(node, proto, problems),
                Item::Message {
                    proto,
                    parent,
                    index,
                } => {
                    self.define(
                        &node.full_name,
                        node.origin_of(&[paths::MESSAGE_NAME]),
                        Target::Message(index),
                        problems,
                    );
                    debug_assert_eq!(self.messages.len(), index as usize);
                    let fields = proto.field.len();
                    self.messages.push(MessageEntry {
                        name: QualifiedName::new(&node.full_name),
                        origin: node.origin(),
                        parent,
                        map_entry: proto.options.as_ref().map_or(false, |o| o.map_entry()),
                        fields: Vec::with_capacity(fields),
                        by_number: BTreeMap::new(),
                        by_name: HashMap::with_capacity(fields),
                        by_json_name: HashMap::with_capacity(fields),
                        oneofs: Vec::with_capacity(proto.oneof_decl.len()),
                        tables: Default::default(),
                    });
                }
                Item::Oneof { message, index } => {
                    self.define(
                        &node.full_name,
                        node.origin_of(&[paths::ONEOF_NAME]),
                        Target::Oneof(message),
                        problems,
                    );
                    let oneofs = &mut self.messages[message as usize].oneofs;
                    debug_assert_eq!(oneofs.len(), index as usize);
                    oneofs.push(OneofEntry {
                        name: QualifiedName::new(&node.full_name),
                        members: Vec::new(),
                    });
                }
                Item::Field { message, .. } => self.define(
                    &node.full_name,
                    node.origin_of(&[paths::FIELD_NAME]),
                    Target::Field(message),
                    problems,
                ),
                Item::Enum {
                    proto,
                    parent,
                    index,
                } => self.declare_enum(node, proto, parent, index, problems),
                Item::EnumValue {
                    proto,
                    owner,
                    enum_,
                    index,
                } => self.declare_enum_value(node, proto, owner, enum_, index, problems),
                Item::Unsupported(what) => {
                    tracing::debug!(
                        name = %node.full_name,
                        what,
                        "skipping unsupported definition"
                    );
                }
            }
        }
    }

    fn declare_file(
        &mut self,
        node: &Node<'_>,
        proto: &FileDescriptorProto,
        problems: &mut Vec<Problem>,
    ) {
        let index = node.file;
        debug_assert_eq!(self.files.len(), index as usize);

        if self.file_lookup.insert(proto.name().into(), index).is_some() {
            problems.push(Problem::new(
                ErrorKind::DuplicateName,
                format!("a different file named '{}' has already been added", proto.name()),
            ));
        }

        let syntax = match proto.syntax() {
            "" | "proto2" => Some(Syntax::Proto2),
            "proto3" => Some(Syntax::Proto3),
            _ => None,
        };
        self.files.push(FileEntry {
            syntax: syntax.unwrap_or(Syntax::Proto3),
            proto: proto.clone(),
            imports: Vec::with_capacity(proto.dependency.len()),
            visible: HashSet::new(),
        });
        if syntax.is_none() {
            problems.push(
                Problem::new(ErrorKind::ParseError, format!("unknown syntax '{}'", proto.syntax()))
                    .help("valid values are 'proto2' and 'proto3'")
                    .at(self.locate(node.origin_of(&[paths::FILE_SYNTAX]))),
            );
        }

        // Every prefix of the package is a package too.
        let package = proto.package();
        if !package.is_empty() {
            let parents = package.match_indices('.').map(|(dot, _)| &package[..dot]);
            for name in parents.chain([package]) {
                self.define(
                    name,
                    node.origin_of(&[paths::FILE_PACKAGE]),
                    Target::Package,
                    problems,
                );
            }
        }
    }

    fn declare_enum(
        &mut self,
        node: &Node<'_>,
        proto: &EnumDescriptorProto,
        parent: Option<MessageIndex>,
        index: EnumIndex,
        problems: &mut Vec<Problem>,
    ) {
        self.define(
            &node.full_name,
            node.origin_of(&[paths::ENUM_NAME]),
            Target::Enum(index),
            problems,
        );

        match proto.value.first() {
            None => problems.push(
                Problem::invalid("enums must have at least one value")
                    .at(self.locate(node.origin())),
            ),
            Some(first)
                if self.files[node.file as usize].syntax == Syntax::Proto3 && first.number() != 0 =>
            {
                let origin = node.origin_of(&[paths::ENUM_VALUE, 0, paths::ENUM_VALUE_NUMBER]);
                problems.push(
                    Problem::invalid("the first value for proto3 enums must be 0")
                        .at(self.locate(origin)),
                );
            }
            Some(_) => {}
        }

        debug_assert_eq!(self.enums.len(), index as usize);
        let values = proto.value.len();
        self.enums.push(EnumEntry {
            name: QualifiedName::new(&node.full_name),
            origin: node.origin(),
            parent,
            values: Vec::with_capacity(values),
            by_number: Vec::with_capacity(values),
            by_name: HashMap::with_capacity(values),
            allow_alias: proto.options.as_ref().map_or(false, |o| o.allow_alias()),
        });
    }

    fn declare_enum_value(
        &mut self,
        node: &Node<'_>,
        proto: &EnumValueDescriptorProto,
        owner: &EnumDescriptorProto,
        enum_: EnumIndex,
        index: EnumValueIndex,
        problems: &mut Vec<Problem>,
    ) {
        self.define(
            &node.full_name,
            node.origin_of(&[paths::ENUM_VALUE_NAME]),
            Target::EnumValue(enum_),
            problems,
        );

        let number = proto.number();
        // Unlike message ranges, enum reserved ranges include their end.
        if owner
            .reserved_range
            .iter()
            .any(|range| (range.start()..=range.end()).contains(&number))
        {
            problems.push(
                Problem::invalid(format!("enum number '{number}' is reserved"))
                    .at(self.locate(node.origin_of(&[paths::ENUM_VALUE_NUMBER]))),
            );
        }

        let entry = &mut self.enums[enum_ as usize];
        debug_assert_eq!(entry.values.len(), index as usize);
        entry.values.push(EnumValueEntry {
            name: QualifiedName::new(&node.full_name),
            number,
        });
        entry.by_name.insert(proto.name().into(), index);
        let at = entry.by_number.partition_point(|&(n, _)| n <= number);
        let reused = at > 0 && entry.by_number[at - 1].0 == number;
        entry.by_number.insert(at, (number, index));

        if reused && !entry.allow_alias {
            problems.push(
                Problem::invalid(format!("enum number '{number}' has already been used"))
                    .help("set the 'allow_alias' option to reuse enum numbers")
                    .at(self.locate(node.origin_of(&[paths::ENUM_VALUE_NUMBER]))),
            );
        }
    }

    /// Publishes `name`, reporting a clash with any existing definition. A package may be
    /// declared by any number of files.
    fn define(&mut self, name: &str, origin: Origin, target: Target, problems: &mut Vec<Problem>) {
        match self.symbols.entry(name.into()) {
            Entry::Vacant(slot) => {
                slot.insert(Symbol { origin, target });
            }
            Entry::Occupied(existing) => {
                if target == Target::Package && existing.get().target == Target::Package {
                    return;
                }
                let first = existing.get().origin.file;
                problems.push(self.duplicate_name(name, first, origin));
            }
        }
    }
}
