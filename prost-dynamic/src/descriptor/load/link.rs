use std::collections::HashSet;

use prost_types::{
    field_descriptor_proto::{Label, Type},
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
};

use crate::descriptor::{
    error::Problem,
    load::{
        flatten::{Item, Node},
        scope::{json_name, resolve, Unresolved},
    },
    paths, Cardinality, FieldEntry, FieldIndex, FileIndex, KindIndex, MessageIndex, Origin,
    PoolData, QualifiedName, Syntax, FIELD_NUMBERS, IMPLEMENTATION_RESERVED,
    MAP_ENTRY_KEY_NUMBER, MAP_ENTRY_VALUE_NUMBER,
};
use crate::ErrorKind;

impl PoolData {
    /// Resolves imports and field types, once every name in the batch has been declared.
    pub(super) fn link(&mut self, nodes: &[Node<'_>], problems: &mut Vec<Problem>) {
        for node in nodes {
            match node.item {
                Item::File(proto) => self.link_imports(node.file, proto, problems),
                Item::Field {
                    proto,
                    owner,
                    message,
                    index,
                } => self.link_field(node, proto, owner, message, index, problems),
                _ => {}
            }
        }
    }

    fn link_imports(
        &mut self,
        file: FileIndex,
        proto: &FileDescriptorProto,
        problems: &mut Vec<Problem>,
    ) {
        let mut imports = Vec::with_capacity(proto.dependency.len());
        for (i, name) in proto.dependency.iter().enumerate() {
            match self.file_lookup.get(name.as_str()) {
                Some(&import) => imports.push(import),
                None => problems.push(
                    Problem::unresolved(format!("imported file '{name}' has not been added"))
                        .at(self.locate(Origin::new(file, &[paths::FILE_DEPENDENCY, i as i32]))),
                ),
            }
        }

        let in_range =
            |&i: &i32| usize::try_from(i).map_or(false, |i| i < proto.dependency.len());
        if !proto.public_dependency.iter().all(in_range) {
            problems.push(Problem::unresolved("invalid import index"));
        }

        let mut visible = HashSet::from([file]);
        let mut pending = imports.clone();
        while let Some(next) = pending.pop() {
            if visible.insert(next) {
                pending.extend(self.public_imports(next));
            }
        }

        let entry = &mut self.files[file as usize];
        entry.imports = imports;
        entry.visible = visible;
    }

    fn public_imports(&self, file: FileIndex) -> impl Iterator<Item = FileIndex> + '_ {
        let proto = &self.files[file as usize].proto;
        proto
            .public_dependency
            .iter()
            .filter_map(move |&i| proto.dependency.get(usize::try_from(i).ok()?))
            .filter_map(move |name| self.file_lookup.get(name.as_str()).copied())
    }

    fn link_field(
        &mut self,
        node: &Node<'_>,
        proto: &FieldDescriptorProto,
        owner: &DescriptorProto,
        message: MessageIndex,
        index: FieldIndex,
        problems: &mut Vec<Problem>,
    ) {
        let number = proto.number();
        let number_origin = node.origin_of(&[paths::FIELD_NUMBER]);
        if !FIELD_NUMBERS.contains(&number) || IMPLEMENTATION_RESERVED.contains(&number) {
            problems.push(
                Problem::invalid(format!("invalid field number '{number}'"))
                    .at(self.locate(number_origin.clone())),
            );
        }
        for range in &owner.reserved_range {
            if (range.start()..range.end()).contains(&number) {
                problems.push(
                    Problem::invalid(format!(
                        "field number '{}' conflicts with reserved range '{} to {}'",
                        number,
                        range.start(),
                        range.end() - 1
                    ))
                    .at(self.locate(number_origin.clone())),
                );
            }
        }

        let cardinality = match proto.label() {
            Label::Optional => Cardinality::Singular,
            Label::Repeated => Cardinality::Repeated,
            Label::Required => {
                problems.push(
                    Problem::new(
                        ErrorKind::Proto2RequiredNotSupported,
                        format!("field '{}' is required, which is not supported", node.full_name),
                    )
                    .help("only the subset of proto2 shared with proto3 is supported")
                    .at(self.locate(node.origin_of(&[paths::FIELD_LABEL]))),
                );
                Cardinality::Singular
            }
        };

        if proto.r#type == Some(Type::Group as i32) {
            problems.push(
                Problem::invalid(format!(
                    "field '{}' is a group, which is not supported",
                    node.full_name
                ))
                .at(self.locate(node.origin_of(&[paths::FIELD_TYPE]))),
            );
        }

        let kind = self.field_kind(node, proto, problems);

        if proto.default_value.is_some() {
            tracing::debug!(
                field = %node.full_name,
                "ignoring explicit default value, proto3 defaults are used instead"
            );
        }

        let json: Box<str> = match &proto.json_name {
            Some(name) => name.as_str().into(),
            None => json_name(proto.name()).into(),
        };

        // Only records the declaration. The encoder packs every repeated scalar.
        let packed = cardinality == Cardinality::Repeated
            && kind.map_or(false, |k| k.is_packable())
            && proto
                .options
                .as_ref()
                .and_then(|o| o.packed)
                .unwrap_or(self.files[node.file as usize].syntax == Syntax::Proto3);

        let oneof_count = self.messages[message as usize].oneofs.len();
        let oneof = match proto.oneof_index {
            Some(i) if usize::try_from(i).map_or(false, |i| i < oneof_count) => Some(i as u32),
            Some(i) => {
                problems.push(
                    Problem::invalid(format!("invalid oneof index {i}"))
                        .at(self.locate(node.origin_of(&[paths::FIELD_ONEOF_INDEX]))),
                );
                None
            }
            None => None,
        };

        let number = number as u32;
        let entry = &mut self.messages[message as usize];
        debug_assert_eq!(entry.fields.len(), index as usize);
        if let Some(oneof) = oneof {
            entry.oneofs[oneof as usize].members.push(index);
        }
        entry.fields.push(FieldEntry {
            name: QualifiedName::new(&node.full_name),
            origin: node.origin(),
            number,
            json_name: json.clone(),
            kind: kind.unwrap_or(KindIndex::Double),
            oneof,
            packed,
            cardinality,
        });
        entry.by_name.insert(proto.name().into(), index);
        let number_taken = entry.by_number.insert(number, index).is_some();
        let json_name_taken = entry.by_json_name.insert(json.clone(), index).is_some();

        if number_taken {
            problems.push(
                Problem::invalid(format!("field number '{number}' is already used"))
                    .at(self.locate(number_origin)),
            );
        }
        if json_name_taken {
            problems.push(
                Problem::invalid(format!("a field with JSON name '{json}' is already defined"))
                    .at(self.locate(node.origin_of(&[paths::FIELD_JSON_NAME]))),
            );
        }
    }

    fn field_kind(
        &self,
        node: &Node<'_>,
        proto: &FieldDescriptorProto,
        problems: &mut Vec<Problem>,
    ) -> Option<KindIndex> {
        let declared = proto.r#type.and_then(|t| Type::try_from(t).ok());
        let type_name = proto.type_name();
        let at_type_name = || self.locate(node.origin_of(&[paths::FIELD_TYPE_NAME]));

        if let Some(scalar) = declared.and_then(scalar_kind) {
            if type_name.is_empty() {
                return Some(scalar);
            }
            problems.push(
                Problem::invalid(format!("scalar field has unexpected type name '{type_name}'"))
                    .at(at_type_name()),
            );
            return None;
        }
        if type_name.is_empty() {
            problems.push(
                Problem::invalid("a message or enum field must set 'type_name'").at(at_type_name()),
            );
            return None;
        }

        let kind = match resolve(self, node.file, node.scope(), type_name) {
            Ok(kind) => kind,
            Err(unresolved) => {
                problems.push(self.unresolved(type_name, unresolved, node.file).at(at_type_name()));
                return None;
            }
        };
        let expected = match (declared, kind) {
            (Some(Type::Message), KindIndex::Enum(_)) => "a message type",
            (Some(Type::Enum), KindIndex::Message(_)) => "an enum type",
            _ => return Some(kind),
        };
        problems.push(
            Problem::unresolved(format!("'{type_name}' is not {expected}")).at(at_type_name()),
        );
        None
    }

    fn unresolved(&self, type_name: &str, unresolved: Unresolved, file: FileIndex) -> Problem {
        match unresolved {
            Unresolved::Missing => {
                Problem::unresolved(format!("name '{type_name}' is not defined"))
            }
            Unresolved::NotAType(name) => {
                Problem::unresolved(format!("'{name}' is not a message or enum type"))
            }
            Unresolved::NotImported { name, defined_in } => {
                let help = format!(
                    "'{}' is defined in '{}', which is not imported by '{}'",
                    name,
                    self.files[defined_in as usize].proto.name(),
                    self.files[file as usize].proto.name()
                );
                Problem::unresolved(format!("name '{name}' is not defined")).help(help)
            }
        }
    }

    /// Checks that map entry types in the batch have the required shape, and are only used by
    /// repeated fields.
    pub(super) fn check_map_entries(&self, first_message: usize, problems: &mut Vec<Problem>) {
        let invalid = |entry: &QualifiedName, reason: &str, origin: &Origin| {
            Problem::invalid(format!("invalid map entry message '{}': {}", entry.full, reason))
                .at(self.locate(origin.clone()))
        };

        for message in &self.messages[first_message..] {
            if message.map_entry {
                if let Err(reason) = check_entry_fields(&message.fields) {
                    problems.push(invalid(&message.name, reason, &message.origin));
                }
            }

            for field in &message.fields {
                let KindIndex::Message(target) = field.kind else {
                    continue;
                };
                let target = &self.messages[target as usize];
                if target.map_entry && field.cardinality != Cardinality::Repeated {
                    problems.push(invalid(
                        &target.name,
                        "map entry types may only be used by repeated fields",
                        &field.origin,
                    ));
                }
            }
        }
    }
}

fn check_entry_fields(fields: &[FieldEntry]) -> Result<(), &'static str> {
    let [key, value] = fields else {
        return Err(ENTRY_SHAPE);
    };
    if key.number != MAP_ENTRY_KEY_NUMBER
        || value.number != MAP_ENTRY_VALUE_NUMBER
        || key.name.short() != "key"
        || value.name.short() != "value"
    {
        return Err(ENTRY_SHAPE);
    }

    if !key.kind.is_valid_map_key() {
        Err("map keys must be an integer, bool or string type")
    } else if key.cardinality == Cardinality::Repeated
        || value.cardinality == Cardinality::Repeated
    {
        Err("map key and value must not be repeated")
    } else if key.oneof.is_some() || value.oneof.is_some() {
        Err("map key and value must not be part of a oneof")
    } else {
        Ok(())
    }
}

const ENTRY_SHAPE: &str =
    "map entries must have exactly a 'key' field numbered 1 and a 'value' field numbered 2";

fn scalar_kind(ty: Type) -> Option<KindIndex> {
    Some(match ty {
        Type::Double => KindIndex::Double,
        Type::Float => KindIndex::Float,
        Type::Int32 => KindIndex::Int32,
        Type::Int64 => KindIndex::Int64,
        Type::Uint32 => KindIndex::Uint32,
        Type::Uint64 => KindIndex::Uint64,
        Type::Sint32 => KindIndex::Sint32,
        Type::Sint64 => KindIndex::Sint64,
        Type::Fixed32 => KindIndex::Fixed32,
        Type::Fixed64 => KindIndex::Fixed64,
        Type::Sfixed32 => KindIndex::Sfixed32,
        Type::Sfixed64 => KindIndex::Sfixed64,
        Type::Bool => KindIndex::Bool,
        Type::String => KindIndex::String,
        Type::Bytes => KindIndex::Bytes,
        Type::Message | Type::Enum | Type::Group => return None,
    })
}
