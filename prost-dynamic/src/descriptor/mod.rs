mod bootstrap;
mod builder;
mod error;
mod handles;
mod load;
mod paths;
mod pool;
#[cfg(test)]
mod tests;

pub use self::{
    builder::{EnumBuilder, FieldType, FileBuilder, MessageBuilder, OneofBuilder},
    error::DescriptorError,
};

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::{Range, RangeInclusive},
    sync::Arc,
};

use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};

use crate::codec::TableCache;

pub(crate) const MAP_ENTRY_KEY_NUMBER: u32 = 1;
pub(crate) const MAP_ENTRY_VALUE_NUMBER: u32 = 2;

const FIELD_NUMBERS: RangeInclusive<i32> = 1..=536_870_911;
/// Numbers set aside for the protobuf implementation.
const IMPLEMENTATION_RESERVED: Range<i32> = 19_000..20_000;

/// Whether a field holds one value or a sequence of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cardinality {
    /// Zero or one value.
    Singular,
    /// Zero or more values. Map fields are repeated too.
    Repeated,
}

/// The `syntax` a file was declared with.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// `proto2`. Only the part of it shared with `proto3` is accepted.
    Proto2,
    /// `proto3`.
    Proto3,
}

/// The declared type of a field.
#[derive(Clone, PartialEq, Eq)]
pub enum Kind {
    /// `double`
    Double,
    /// `float`
    Float,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `bool`
    Bool,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// A message type.
    Message(MessageDescriptor),
    /// An enum type.
    Enum(EnumDescriptor),
}

/// A [`Kind`] with message and enum types referred to by their position in the pool.
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum KindIndex {
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
    Message(MessageIndex),
    Enum(EnumIndex),
}

type FileIndex = u32;
pub(crate) type MessageIndex = u32;
pub(crate) type FieldIndex = u32;
pub(crate) type OneofIndex = u32;
pub(crate) type EnumIndex = u32;
type EnumValueIndex = u32;

/// A symbol table of message and enum types.
///
/// A pool is usually decoded from a serialized [`FileDescriptorSet`][prost_types::FileDescriptorSet]
/// with [`DescriptorPool::decode`], but files can also be added one batch at a time. Each batch is
/// checked as a whole and either every file in it is added or none are.
///
/// Cloning a pool is cheap. Adding files to a pool does not affect its existing clones, nor any
/// descriptor already handed out.
#[derive(Clone, Default)]
pub struct DescriptorPool {
    data: Arc<PoolData>,
}

#[derive(Clone, Default)]
struct PoolData {
    files: Vec<FileEntry>,
    messages: Vec<MessageEntry>,
    enums: Vec<EnumEntry>,
    symbols: HashMap<Box<str>, Symbol>,
    file_lookup: HashMap<Box<str>, FileIndex>,
}

/// The file a definition was declared in, and its source path within that file.
#[derive(Clone, Debug)]
struct Origin {
    file: FileIndex,
    path: Box<[i32]>,
}

#[derive(Clone, Debug)]
struct Symbol {
    origin: Origin,
    target: Target,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Target {
    Package,
    Message(MessageIndex),
    Field(MessageIndex),
    Oneof(MessageIndex),
    Enum(EnumIndex),
    EnumValue(EnumIndex),
}

#[derive(Clone)]
struct QualifiedName {
    full: Box<str>,
    short_start: usize,
}

#[derive(Clone)]
struct FileEntry {
    syntax: Syntax,
    proto: FileDescriptorProto,
    imports: Vec<FileIndex>,
    /// This file, its imports, and anything those import publicly.
    visible: HashSet<FileIndex>,
}

#[derive(Clone)]
struct MessageEntry {
    name: QualifiedName,
    origin: Origin,
    parent: Option<MessageIndex>,
    map_entry: bool,
    fields: Vec<FieldEntry>,
    by_number: BTreeMap<u32, FieldIndex>,
    by_name: HashMap<Box<str>, FieldIndex>,
    by_json_name: HashMap<Box<str>, FieldIndex>,
    oneofs: Vec<OneofEntry>,
    tables: TableCache,
}

#[derive(Clone)]
struct FieldEntry {
    name: QualifiedName,
    origin: Origin,
    number: u32,
    json_name: Box<str>,
    kind: KindIndex,
    oneof: Option<OneofIndex>,
    packed: bool,
    cardinality: Cardinality,
}

#[derive(Clone)]
struct OneofEntry {
    name: QualifiedName,
    members: Vec<FieldIndex>,
}

#[derive(Clone)]
struct EnumEntry {
    name: QualifiedName,
    origin: Origin,
    parent: Option<MessageIndex>,
    values: Vec<EnumValueEntry>,
    /// Sorted by number. Aliases keep declaration order.
    by_number: Vec<(i32, EnumValueIndex)>,
    by_name: HashMap<Box<str>, EnumValueIndex>,
    allow_alias: bool,
}

#[derive(Clone)]
struct EnumValueEntry {
    name: QualifiedName,
    number: i32,
}

/// A message or enum type, as returned by [`DescriptorPool::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A message type.
    Message(MessageDescriptor),
    /// An enum type.
    Enum(EnumDescriptor),
}

/// Identifies a [`MessageDescriptor`] within its pool.
///
/// Adding files never renumbers existing messages, so an id taken from one snapshot of a pool
/// resolves to the same message in any later snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorId(MessageIndex);

/// A `.proto` file that was added to a pool.
#[derive(Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pool: DescriptorPool,
    index: FileIndex,
}

/// A message type.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pool: DescriptorPool,
    index: MessageIndex,
}

/// A field of a message type.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    message: MessageDescriptor,
    index: FieldIndex,
}

/// A oneof group of a message type.
#[derive(Clone, PartialEq, Eq)]
pub struct OneofDescriptor {
    message: MessageDescriptor,
    index: OneofIndex,
}

/// An enum type.
#[derive(Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    pool: DescriptorPool,
    index: EnumIndex,
}

/// A value of an enum type.
#[derive(Clone, PartialEq, Eq)]
pub struct EnumValueDescriptor {
    parent: EnumDescriptor,
    index: EnumValueIndex,
}

impl Origin {
    fn new(file: FileIndex, path: &[i32]) -> Self {
        Origin {
            file,
            path: path.into(),
        }
    }
}

impl QualifiedName {
    fn new(full: &str) -> Self {
        QualifiedName {
            full: full.into(),
            short_start: full.rfind('.').map_or(0, |dot| dot + 1),
        }
    }

    fn short(&self) -> &str {
        &self.full[self.short_start..]
    }
}

impl KindIndex {
    pub(crate) fn is_packable(&self) -> bool {
        !matches!(
            self,
            KindIndex::String | KindIndex::Bytes | KindIndex::Message(_)
        )
    }

    pub(crate) fn is_valid_map_key(&self) -> bool {
        !matches!(
            self,
            KindIndex::Double | KindIndex::Float | KindIndex::Message(_) | KindIndex::Enum(_)
        )
    }

    /// The `.proto` keyword for scalar kinds, or `message` and `enum`.
    fn keyword(&self) -> &'static str {
        match self {
            KindIndex::Double => "double",
            KindIndex::Float => "float",
            KindIndex::Int32 => "int32",
            KindIndex::Int64 => "int64",
            KindIndex::Uint32 => "uint32",
            KindIndex::Uint64 => "uint64",
            KindIndex::Sint32 => "sint32",
            KindIndex::Sint64 => "sint64",
            KindIndex::Fixed32 => "fixed32",
            KindIndex::Fixed64 => "fixed64",
            KindIndex::Sfixed32 => "sfixed32",
            KindIndex::Sfixed64 => "sfixed64",
            KindIndex::Bool => "bool",
            KindIndex::String => "string",
            KindIndex::Bytes => "bytes",
            KindIndex::Message(_) => "message",
            KindIndex::Enum(_) => "enum",
        }
    }
}

impl std::fmt::Debug for KindIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

fn to_index(i: usize) -> u32 {
    u32::try_from(i).expect("too many definitions in descriptor pool")
}

/// Follows a source path of the form `[4, i, 3, j, 3, k, ...]` to a message.
fn message_at<'a>(file: &'a FileDescriptorProto, path: &[i32]) -> &'a DescriptorProto {
    let (top, nested) = path.split_at(2);
    nested
        .chunks_exact(2)
        .fold(&file.message_type[top[1] as usize], |message, step| {
            &message.nested_type[step[1] as usize]
        })
}

/// Follows a source path to an enum, either top-level or nested in a message.
fn enum_at<'a>(file: &'a FileDescriptorProto, path: &[i32]) -> &'a EnumDescriptorProto {
    let (scope, last) = path.split_at(path.len() - 2);
    let enums = if scope.is_empty() {
        &file.enum_type
    } else {
        &message_at(file, scope).enum_type
    };
    &enums[last[1] as usize]
}
