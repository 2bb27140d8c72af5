use std::{fmt, sync::Arc};

use prost::{bytes::Buf, Message as _};
use prost_types::{FileDescriptorProto, FileDescriptorSet};

use crate::descriptor::{
    to_index, Descriptor, DescriptorError, DescriptorId, DescriptorPool, EnumDescriptor, EnumIndex,
    FileDescriptor, FileIndex, MessageDescriptor, MessageIndex, Target,
};

impl DescriptorPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        DescriptorPool::default()
    }

    /// Creates a pool holding every file in `set`.
    pub fn from_file_descriptor_set(set: FileDescriptorSet) -> Result<Self, DescriptorError> {
        let mut pool = DescriptorPool::new();
        pool.add_file_descriptor_set(set)?;
        Ok(pool)
    }

    /// Creates a pool from an encoded [`FileDescriptorSet`], such as the output of
    /// `protoc --descriptor_set_out`.
    pub fn decode<B>(bytes: B) -> Result<Self, DescriptorError>
    where
        B: Buf,
    {
        let mut pool = DescriptorPool::new();
        pool.add(bytes)?;
        Ok(pool)
    }

    /// Decodes an encoded [`FileDescriptorSet`] and adds its files to this pool.
    ///
    /// The files are checked together. Each may refer to types in any file of the same set, or
    /// in a file already in the pool. If any problem is found no file is added, and the pool is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError`][crate::ErrorKind::ParseError] if `bytes` is not a valid
    /// descriptor set, and with the kind of the first problem found otherwise.
    pub fn add<B>(&mut self, bytes: B) -> Result<(), DescriptorError>
    where
        B: Buf,
    {
        let set = FileDescriptorSet::decode(bytes).map_err(DescriptorError::undecodable)?;
        self.add_file_descriptor_set(set)
    }

    /// Adds the files of an already decoded [`FileDescriptorSet`].
    ///
    /// A file identical to one already in the pool is skipped. A different file with the same
    /// name is rejected.
    pub fn add_file_descriptor_set(
        &mut self,
        set: FileDescriptorSet,
    ) -> Result<(), DescriptorError> {
        self.load(set.file)
    }

    /// Adds a batch of files, given in any order.
    pub fn add_file_descriptor_protos<I>(&mut self, files: I) -> Result<(), DescriptorError>
    where
        I: IntoIterator<Item = FileDescriptorProto>,
    {
        self.load(files.into_iter().collect())
    }

    /// Adds a single file.
    pub fn add_file_descriptor_proto(
        &mut self,
        file: FileDescriptorProto,
    ) -> Result<(), DescriptorError> {
        self.load(vec![file])
    }

    /// The files in this pool, in the order they were added.
    pub fn files(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        (0..self.data.files.len()).map(|i| self.file(to_index(i)))
    }

    /// Finds a file by the name it was added under.
    pub fn get_file_by_name(&self, name: &str) -> Option<FileDescriptor> {
        let &index = self.data.file_lookup.get(name)?;
        Some(self.file(index))
    }

    /// Every message type in this pool, including nested types and map entries.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.data.messages.len()).map(|i| self.message(to_index(i)))
    }

    /// Every enum type in this pool, including nested types.
    pub fn enums(&self) -> impl ExactSizeIterator<Item = EnumDescriptor> + '_ {
        (0..self.data.enums.len()).map(|i| self.enum_(to_index(i)))
    }

    /// Finds a message or enum type by its fully-qualified name, such as `my.package.MyMessage`.
    ///
    /// A leading `.` is ignored. Names of packages, fields and enum values give `None`.
    pub fn lookup(&self, name: &str) -> Option<Descriptor> {
        match self.target(name)? {
            Target::Message(index) => Some(Descriptor::Message(self.message(index))),
            Target::Enum(index) => Some(Descriptor::Enum(self.enum_(index))),
            _ => None,
        }
    }

    /// Finds a message type by its fully-qualified name.
    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        match self.target(name)? {
            Target::Message(index) => Some(self.message(index)),
            _ => None,
        }
    }

    /// Finds an enum type by its fully-qualified name.
    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        match self.target(name)? {
            Target::Enum(index) => Some(self.enum_(index)),
            _ => None,
        }
    }

    /// Resolves an id from [`MessageDescriptor::id`] back to its message.
    ///
    /// Gives `None` for an id taken from a later snapshot holding more messages than this one.
    pub fn find_message_by_descriptor_pointer(
        &self,
        id: DescriptorId,
    ) -> Option<MessageDescriptor> {
        ((id.0 as usize) < self.data.messages.len()).then(|| self.message(id.0))
    }

    pub(crate) fn message(&self, index: MessageIndex) -> MessageDescriptor {
        debug_assert!((index as usize) < self.data.messages.len());
        MessageDescriptor {
            pool: self.clone(),
            index,
        }
    }

    pub(crate) fn enum_(&self, index: EnumIndex) -> EnumDescriptor {
        debug_assert!((index as usize) < self.data.enums.len());
        EnumDescriptor {
            pool: self.clone(),
            index,
        }
    }

    pub(super) fn file(&self, index: FileIndex) -> FileDescriptor {
        FileDescriptor {
            pool: self.clone(),
            index,
        }
    }

    fn target(&self, name: &str) -> Option<Target> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.data.symbols.get(name).map(|symbol| symbol.target)
    }
}

impl fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorPool")
            .field("files", &self.files().collect::<Vec<_>>())
            .field("messages", &self.messages().collect::<Vec<_>>())
            .field("enums", &self.enums().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for DescriptorPool {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for DescriptorPool {}

impl Descriptor {
    /// The fully-qualified name of the type.
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::Message(desc) => desc.full_name(),
            Descriptor::Enum(desc) => desc.full_name(),
        }
    }

    /// The message type, if this is one.
    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            Descriptor::Message(desc) => Some(desc),
            Descriptor::Enum(_) => None,
        }
    }

    /// The enum type, if this is one.
    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            Descriptor::Enum(desc) => Some(desc),
            Descriptor::Message(_) => None,
        }
    }
}
