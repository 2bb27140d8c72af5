use std::collections::HashMap;

use crate::{
    descriptor::{FieldIndex, KindIndex},
    Cardinality, FieldDescriptor, MessageDescriptor,
};

/// Field numbers below this are looked up by direct indexing.
const DENSE_LIMIT: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Singular,
    List,
    Map { key: KindIndex, value: KindIndex },
}

/// How to read and write one field of a message instance.
#[derive(Debug, Clone)]
pub(crate) struct FieldEntry {
    pub(crate) field: FieldIndex,
    pub(crate) number: u32,
    pub(crate) slot: usize,
    pub(crate) case_slot: Option<usize>,
    pub(crate) shape: Shape,
    pub(crate) kind: KindIndex,
}

/// The binary method table of a message type: its fields in definition order, and a lookup
/// from field number to field.
#[derive(Debug, Clone)]
pub(crate) struct WireTable {
    entries: Box<[FieldEntry]>,
    dense: Box<[Option<u32>]>,
    sparse: HashMap<u32, u32>,
}

/// Field lookup for the JSON decoder. JSON names take priority over proto names.
#[cfg(feature = "serde")]
#[derive(Debug, Clone)]
pub(crate) struct JsonTable {
    names: HashMap<Box<str>, FieldIndex>,
}

impl FieldEntry {
    fn new(desc: &MessageDescriptor, field: &FieldDescriptor) -> Self {
        let layout = desc.layout();
        let kind = field.kind_index();

        let shape = match (field.cardinality(), kind) {
            (Cardinality::Repeated, KindIndex::Message(entry)) if field.is_map() => {
                let entry = desc.parent_pool().message(entry);
                Shape::Map {
                    key: entry.map_entry_key_field().kind_index(),
                    value: entry.map_entry_value_field().kind_index(),
                }
            }
            (Cardinality::Repeated, _) => Shape::List,
            (Cardinality::Singular, _) => Shape::Singular,
        };

        FieldEntry {
            field: field.index(),
            number: field.number(),
            slot: layout.slot(field.index()),
            case_slot: field.oneof_index().map(|oneof| layout.oneof(oneof).case),
            shape,
            kind,
        }
    }
}

impl WireTable {
    fn new(desc: &MessageDescriptor) -> Self {
        let entries: Box<[FieldEntry]> = desc
            .fields()
            .map(|field| FieldEntry::new(desc, &field))
            .collect();

        let dense_len = entries
            .iter()
            .map(|entry| entry.number)
            .filter(|&number| number < DENSE_LIMIT)
            .max()
            .map_or(0, |max| max as usize + 1);
        let mut dense = vec![None; dense_len];
        let mut sparse = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.number < DENSE_LIMIT {
                dense[entry.number as usize] = Some(index as u32);
            } else {
                sparse.insert(entry.number, index as u32);
            }
        }

        WireTable {
            entries,
            dense: dense.into(),
            sparse,
        }
    }

    pub(crate) fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub(crate) fn get(&self, number: u32) -> Option<&FieldEntry> {
        let index = if number < DENSE_LIMIT {
            self.dense.get(number as usize).copied().flatten()
        } else {
            self.sparse.get(&number).copied()
        };
        index.map(|index| &self.entries[index as usize])
    }
}

#[cfg(feature = "serde")]
impl JsonTable {
    fn new(desc: &MessageDescriptor) -> Self {
        let mut names = HashMap::with_capacity(desc.fields().len() * 2);
        for field in desc.fields() {
            names.insert(field.json_name().into(), field.index());
        }
        for field in desc.fields() {
            names.entry(field.name().into()).or_insert(field.index());
        }
        JsonTable { names }
    }

    pub(crate) fn get(&self, name: &str) -> Option<FieldIndex> {
        self.names.get(name).copied()
    }
}

impl MessageDescriptor {
    pub(crate) fn wire_table(&self) -> &WireTable {
        self.tables().wire.get_or_init(|| {
            let table = WireTable::new(self);
            tracing::trace!(
                message = self.full_name(),
                fields = table.entries.len(),
                "built wire table"
            );
            table
        })
    }

    #[cfg(feature = "serde")]
    pub(crate) fn json_table(&self) -> &JsonTable {
        self.tables().json.get_or_init(|| {
            let table = JsonTable::new(self);
            tracing::trace!(
                message = self.full_name(),
                names = table.names.len(),
                "built json table"
            );
            table
        })
    }
}
