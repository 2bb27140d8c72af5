use std::fmt;

use prost::encoding::WireType;
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};

use crate::{
    codec::TableCache,
    descriptor::{
        enum_at, message_at, to_index, Cardinality, DescriptorId, DescriptorPool, EnumDescriptor,
        EnumEntry, EnumValueDescriptor, EnumValueEntry, EnumValueIndex, FieldDescriptor,
        FieldEntry, FieldIndex, FileDescriptor, FileEntry, Kind, KindIndex, MessageDescriptor,
        MessageEntry, MessageIndex, OneofDescriptor, OneofEntry, OneofIndex, Syntax,
        MAP_ENTRY_KEY_NUMBER, MAP_ENTRY_VALUE_NUMBER,
    },
};

impl fmt::Debug for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        })
    }
}

impl Kind {
    pub(crate) fn new(pool: &DescriptorPool, kind: KindIndex) -> Self {
        use KindIndex as K;

        match kind {
            K::Message(index) => Kind::Message(pool.message(index)),
            K::Enum(index) => Kind::Enum(pool.enum_(index)),
            K::Double => Kind::Double,
            K::Float => Kind::Float,
            K::Int32 => Kind::Int32,
            K::Int64 => Kind::Int64,
            K::Uint32 => Kind::Uint32,
            K::Uint64 => Kind::Uint64,
            K::Sint32 => Kind::Sint32,
            K::Sint64 => Kind::Sint64,
            K::Fixed32 => Kind::Fixed32,
            K::Fixed64 => Kind::Fixed64,
            K::Sfixed32 => Kind::Sfixed32,
            K::Sfixed64 => Kind::Sfixed64,
            K::Bool => Kind::Bool,
            K::String => Kind::String,
            K::Bytes => Kind::Bytes,
        }
    }

    fn index(&self) -> KindIndex {
        match self {
            Kind::Message(desc) => KindIndex::Message(desc.index),
            Kind::Enum(desc) => KindIndex::Enum(desc.index),
            Kind::Double => KindIndex::Double,
            Kind::Float => KindIndex::Float,
            Kind::Int32 => KindIndex::Int32,
            Kind::Int64 => KindIndex::Int64,
            Kind::Uint32 => KindIndex::Uint32,
            Kind::Uint64 => KindIndex::Uint64,
            Kind::Sint32 => KindIndex::Sint32,
            Kind::Sint64 => KindIndex::Sint64,
            Kind::Fixed32 => KindIndex::Fixed32,
            Kind::Fixed64 => KindIndex::Fixed64,
            Kind::Sfixed32 => KindIndex::Sfixed32,
            Kind::Sfixed64 => KindIndex::Sfixed64,
            Kind::Bool => KindIndex::Bool,
            Kind::String => KindIndex::String,
            Kind::Bytes => KindIndex::Bytes,
        }
    }

    /// The message type, if this is one.
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Kind::Message(desc) => Some(desc),
            _ => None,
        }
    }

    /// The enum type, if this is one.
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            Kind::Enum(desc) => Some(desc),
            _ => None,
        }
    }

    /// The wire type a single value of this kind is written with. Packed repeated fields are
    /// always length-delimited regardless.
    pub fn wire_type(&self) -> WireType {
        match self {
            Kind::Double | Kind::Fixed64 | Kind::Sfixed64 => WireType::SixtyFourBit,
            Kind::Float | Kind::Fixed32 | Kind::Sfixed32 => WireType::ThirtyTwoBit,
            Kind::String | Kind::Bytes | Kind::Message(_) => WireType::LengthDelimited,
            _ => WireType::Varint,
        }
    }

    /// Whether a map may have keys of this kind.
    pub fn is_valid_map_key(&self) -> bool {
        self.index().is_valid_map_key()
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Message(desc) => f.write_str(desc.full_name()),
            Kind::Enum(desc) => f.write_str(desc.full_name()),
            scalar => f.write_str(scalar.index().keyword()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FileDescriptor {
    /// The pool this file was added to.
    pub fn parent_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The name the file was added under, e.g. `path/to/my_package.proto`.
    pub fn name(&self) -> &str {
        self.entry().proto.name()
    }

    /// The package the file declares, or an empty string.
    pub fn package_name(&self) -> &str {
        self.entry().proto.package()
    }

    /// The position of this file in [`DescriptorPool::files`].
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// The syntax the file was declared with.
    pub fn syntax(&self) -> Syntax {
        self.entry().syntax
    }

    /// The files this file imports, in declaration order.
    pub fn dependencies(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        self.entry()
            .imports
            .iter()
            .map(|&index| self.pool.file(index))
    }

    /// The message types declared at the top level of this file.
    pub fn messages(&self) -> impl Iterator<Item = MessageDescriptor> + '_ {
        self.pool.messages().filter(|message| {
            let entry = message.entry();
            entry.parent.is_none() && entry.origin.file == self.index
        })
    }

    /// The enum types declared at the top level of this file.
    pub fn enums(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        self.pool.enums().filter(|enum_| {
            let entry = enum_.entry();
            entry.parent.is_none() && entry.origin.file == self.index
        })
    }

    /// The [`FileDescriptorProto`] the file was added from.
    pub fn file_descriptor_proto(&self) -> &FileDescriptorProto {
        &self.entry().proto
    }

    fn entry(&self) -> &FileEntry {
        &self.pool.data.files[self.index as usize]
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.name())
            .field("package_name", &self.package_name())
            .field("syntax", &self.syntax())
            .finish()
    }
}

impl MessageDescriptor {
    /// The pool this message type belongs to.
    pub fn parent_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The file this message type is declared in.
    pub fn parent_file(&self) -> FileDescriptor {
        self.pool.file(self.entry().origin.file)
    }

    /// The message this type is nested in, if any.
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.entry().parent.map(|index| self.pool.message(index))
    }

    /// The short name, e.g. `MyMessage`.
    pub fn name(&self) -> &str {
        self.entry().name.short()
    }

    /// The fully-qualified name, e.g. `my.package.MyMessage`.
    pub fn full_name(&self) -> &str {
        &self.entry().name.full
    }

    /// The package of the file this type is declared in.
    pub fn package_name(&self) -> &str {
        self.file_proto().package()
    }

    /// An id for this type that stays valid as more files are added to the pool.
    ///
    /// See [`DescriptorPool::find_message_by_descriptor_pointer`].
    pub fn id(&self) -> DescriptorId {
        DescriptorId(self.index)
    }

    /// The [`DescriptorProto`] this type was built from.
    pub fn descriptor_proto(&self) -> &DescriptorProto {
        message_at(self.file_proto(), &self.entry().origin.path)
    }

    /// The fields of this type, in declaration order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.entry().fields.len()).map(|i| self.field_at(to_index(i)))
    }

    /// The oneofs of this type, in declaration order.
    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        (0..self.entry().oneofs.len()).map(|i| OneofDescriptor {
            message: self.clone(),
            index: to_index(i),
        })
    }

    /// Finds a field by number.
    pub fn get_field(&self, number: u32) -> Option<FieldDescriptor> {
        let &index = self.entry().by_number.get(&number)?;
        Some(self.field_at(index))
    }

    /// Finds a field by name.
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        let &index = self.entry().by_name.get(name)?;
        Some(self.field_at(index))
    }

    /// Finds a field by its JSON name.
    pub fn get_field_by_json_name(&self, json_name: &str) -> Option<FieldDescriptor> {
        let &index = self.entry().by_json_name.get(json_name)?;
        Some(self.field_at(index))
    }

    /// Finds a oneof by name.
    pub fn get_oneof_by_name(&self, name: &str) -> Option<OneofDescriptor> {
        self.oneofs().find(|oneof| oneof.name() == name)
    }

    /// Whether this is the synthesized entry type of a map field.
    ///
    /// An entry type always has exactly a `key` field numbered 1 and a `value` field numbered 2.
    pub fn is_map_entry(&self) -> bool {
        self.entry().map_entry
    }

    /// The `key` field of a [map entry](MessageDescriptor::is_map_entry) type.
    ///
    /// # Panics
    ///
    /// May panic if this is not a map entry type.
    pub fn map_entry_key_field(&self) -> FieldDescriptor {
        debug_assert!(self.is_map_entry());
        self.get_field(MAP_ENTRY_KEY_NUMBER)
            .expect("map entry has no key field")
    }

    /// The `value` field of a [map entry](MessageDescriptor::is_map_entry) type.
    ///
    /// # Panics
    ///
    /// May panic if this is not a map entry type.
    pub fn map_entry_value_field(&self) -> FieldDescriptor {
        debug_assert!(self.is_map_entry());
        self.get_field(MAP_ENTRY_VALUE_NUMBER)
            .expect("map entry has no value field")
    }

    pub(crate) fn index(&self) -> MessageIndex {
        self.index
    }

    pub(crate) fn tables(&self) -> &TableCache {
        &self.entry().tables
    }

    pub(crate) fn field_at(&self, index: FieldIndex) -> FieldDescriptor {
        debug_assert!((index as usize) < self.entry().fields.len());
        FieldDescriptor {
            message: self.clone(),
            index,
        }
    }

    fn entry(&self) -> &MessageEntry {
        &self.pool.data.messages[self.index as usize]
    }

    fn file_proto(&self) -> &FileDescriptorProto {
        &self.pool.data.files[self.entry().origin.file as usize].proto
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("full_name", &self.full_name())
            .field("is_map_entry", &self.is_map_entry())
            .field("fields", &self.fields().collect::<Vec<_>>())
            .field("oneofs", &self.oneofs().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldDescriptor {
    /// The pool the field's message type belongs to.
    pub fn parent_pool(&self) -> &DescriptorPool {
        self.message.parent_pool()
    }

    /// The message type declaring this field.
    pub fn parent_message(&self) -> &MessageDescriptor {
        &self.message
    }

    /// The short name, e.g. `my_field`.
    pub fn name(&self) -> &str {
        self.entry().name.short()
    }

    /// The fully-qualified name, e.g. `my.package.MyMessage.my_field`.
    pub fn full_name(&self) -> &str {
        &self.entry().name.full
    }

    /// The field number.
    pub fn number(&self) -> u32 {
        self.entry().number
    }

    /// The key used for this field in JSON. Unless the file sets it explicitly, this is the
    /// name converted to `lowerCamelCase`.
    pub fn json_name(&self) -> &str {
        &self.entry().json_name
    }

    /// Whether this is a repeated field that is not a map.
    pub fn is_list(&self) -> bool {
        self.cardinality() == Cardinality::Repeated && !self.is_map()
    }

    /// Whether this is a repeated field of a [map entry](MessageDescriptor::is_map_entry) type.
    pub fn is_map(&self) -> bool {
        let entry = self.entry();
        let messages = &self.parent_pool().data.messages;
        entry.cardinality == Cardinality::Repeated
            && matches!(entry.kind, KindIndex::Message(target) if messages[target as usize].map_entry)
    }

    /// Whether the field was declared packed. The encoder packs every repeated scalar
    /// regardless.
    pub fn is_packed(&self) -> bool {
        self.entry().packed
    }

    /// Whether the field is singular or repeated.
    pub fn cardinality(&self) -> Cardinality {
        self.entry().cardinality
    }

    /// The declared type of the field.
    pub fn kind(&self) -> Kind {
        Kind::new(self.parent_pool(), self.entry().kind)
    }

    /// The oneof this field is a member of, if any.
    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.entry().oneof.map(|index| OneofDescriptor {
            message: self.message.clone(),
            index,
        })
    }

    pub(crate) fn index(&self) -> FieldIndex {
        self.index
    }

    pub(crate) fn kind_index(&self) -> KindIndex {
        self.entry().kind
    }

    pub(crate) fn oneof_index(&self) -> Option<OneofIndex> {
        self.entry().oneof
    }

    fn entry(&self) -> &FieldEntry {
        &self.message.entry().fields[self.index as usize]
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("full_name", &self.full_name())
            .field("json_name", &self.json_name())
            .field("number", &self.number())
            .field("kind", &self.kind())
            .field("cardinality", &self.cardinality())
            .field("oneof", &self.containing_oneof().map(|o| o.name().to_owned()))
            .finish()
    }
}

impl OneofDescriptor {
    /// The message type declaring this oneof.
    pub fn parent_message(&self) -> &MessageDescriptor {
        &self.message
    }

    /// The short name, e.g. `my_oneof`.
    pub fn name(&self) -> &str {
        self.entry().name.short()
    }

    /// The fully-qualified name, e.g. `my.package.MyMessage.my_oneof`.
    pub fn full_name(&self) -> &str {
        &self.entry().name.full
    }

    /// The member fields, in declaration order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.entry()
            .members
            .iter()
            .map(|&index| self.message.field_at(index))
    }

    pub(crate) fn index(&self) -> OneofIndex {
        self.index
    }

    fn entry(&self) -> &OneofEntry {
        &self.message.entry().oneofs[self.index as usize]
    }
}

impl fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<_> = self.fields().map(|field| field.number()).collect();
        f.debug_struct("OneofDescriptor")
            .field("full_name", &self.full_name())
            .field("fields", &members)
            .finish()
    }
}

impl EnumDescriptor {
    /// The pool this enum type belongs to.
    pub fn parent_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The file this enum type is declared in.
    pub fn parent_file(&self) -> FileDescriptor {
        self.pool.file(self.entry().origin.file)
    }

    /// The message this type is nested in, if any.
    pub fn parent_message(&self) -> Option<MessageDescriptor> {
        self.entry().parent.map(|index| self.pool.message(index))
    }

    /// The short name, e.g. `MyEnum`.
    pub fn name(&self) -> &str {
        self.entry().name.short()
    }

    /// The fully-qualified name, e.g. `my.package.MyEnum`.
    pub fn full_name(&self) -> &str {
        &self.entry().name.full
    }

    /// The first declared value, which is the default.
    pub fn default_value(&self) -> EnumValueDescriptor {
        self.value_at(0)
    }

    /// Finds a value by name.
    pub fn get_value_by_name(&self, name: &str) -> Option<EnumValueDescriptor> {
        let &index = self.entry().by_name.get(name)?;
        Some(self.value_at(index))
    }

    /// Finds a value by number. When several values share the number through `allow_alias`,
    /// the first declared is returned.
    pub fn get_value(&self, number: i32) -> Option<EnumValueDescriptor> {
        let by_number = &self.entry().by_number;
        let at = by_number.partition_point(|&(n, _)| n < number);
        match by_number.get(at) {
            Some(&(n, index)) if n == number => Some(self.value_at(index)),
            _ => None,
        }
    }

    /// The values, in declaration order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = EnumValueDescriptor> + '_ {
        (0..self.entry().values.len()).map(|i| self.value_at(to_index(i)))
    }

    /// The [`EnumDescriptorProto`] this type was built from.
    pub fn enum_descriptor_proto(&self) -> &EnumDescriptorProto {
        let entry = self.entry();
        let file = &self.pool.data.files[entry.origin.file as usize].proto;
        enum_at(file, &entry.origin.path)
    }

    fn value_at(&self, index: EnumValueIndex) -> EnumValueDescriptor {
        EnumValueDescriptor {
            parent: self.clone(),
            index,
        }
    }

    fn entry(&self) -> &EnumEntry {
        &self.pool.data.enums[self.index as usize]
    }
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumDescriptor")
            .field("full_name", &self.full_name())
            .field("values", &self.values().collect::<Vec<_>>())
            .finish()
    }
}

impl EnumValueDescriptor {
    /// The enum type declaring this value.
    pub fn parent_enum(&self) -> &EnumDescriptor {
        &self.parent
    }

    /// The short name, e.g. `MY_VALUE`.
    pub fn name(&self) -> &str {
        self.entry().name.short()
    }

    /// The fully-qualified name. Values are scoped alongside their enum rather than inside it,
    /// so this is e.g. `my.package.MY_VALUE`.
    pub fn full_name(&self) -> &str {
        &self.entry().name.full
    }

    /// The number of this value.
    pub fn number(&self) -> i32 {
        self.entry().number
    }

    fn entry(&self) -> &EnumValueEntry {
        &self.parent.entry().values[self.index as usize]
    }
}

impl fmt::Debug for EnumValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name(), self.number())
    }
}
