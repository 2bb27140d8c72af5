use std::io;

use prost::{
    bytes::BufMut,
    encoding::{encode_varint, encoded_len_varint, WireType},
};

use crate::{
    codec::{FieldEntry, Shape, RECURSION_LIMIT},
    descriptor::{KindIndex, MAP_ENTRY_KEY_NUMBER, MAP_ENTRY_VALUE_NUMBER},
    Error, MapField, Message, RepeatedField, Value,
};

/// The wire representation of a single scalar value.
enum Scalar<'a> {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    Bytes(&'a [u8]),
}

impl<'a> Scalar<'a> {
    fn new(kind: KindIndex, value: &'a Value) -> Result<Self, Error> {
        Ok(match (kind, value) {
            (KindIndex::Int32, Value::I32(v)) => Scalar::Varint(*v as i64 as u64),
            (KindIndex::Sint32, Value::I32(v)) => {
                Scalar::Varint(((v << 1) ^ (v >> 31)) as u32 as u64)
            }
            (KindIndex::Sfixed32, Value::I32(v)) => Scalar::Fixed32(*v as u32),
            (KindIndex::Int64, Value::I64(v)) => Scalar::Varint(v.get() as u64),
            (KindIndex::Sint64, Value::I64(v)) => {
                let v = v.get();
                Scalar::Varint(((v << 1) ^ (v >> 63)) as u64)
            }
            (KindIndex::Sfixed64, Value::I64(v)) => Scalar::Fixed64(v.get() as u64),
            (KindIndex::Uint32, Value::U32(v)) => Scalar::Varint((*v).into()),
            (KindIndex::Fixed32, Value::U32(v)) => Scalar::Fixed32(*v),
            (KindIndex::Uint64, Value::U64(v)) => Scalar::Varint(v.get()),
            (KindIndex::Fixed64, Value::U64(v)) => Scalar::Fixed64(v.get()),
            (KindIndex::Float, Value::F32(v)) => Scalar::Fixed32(v.to_bits()),
            (KindIndex::Double, Value::F64(v)) => Scalar::Fixed64(v.to_bits()),
            (KindIndex::Bool, Value::Bool(v)) => Scalar::Varint((*v).into()),
            (KindIndex::Enum(_), Value::EnumNumber(v)) => Scalar::Varint(*v as i64 as u64),
            (KindIndex::String, Value::String(v)) => Scalar::Bytes(v.as_bytes()),
            (KindIndex::Bytes, Value::Bytes(v)) => Scalar::Bytes(v),
            (kind, value) => return Err(mismatch(kind, value)),
        })
    }

    fn wire_type(&self) -> WireType {
        match self {
            Scalar::Varint(_) => WireType::Varint,
            Scalar::Fixed32(_) => WireType::ThirtyTwoBit,
            Scalar::Fixed64(_) => WireType::SixtyFourBit,
            Scalar::Bytes(_) => WireType::LengthDelimited,
        }
    }

    /// The length of the value without its key.
    fn len(&self) -> usize {
        match self {
            Scalar::Varint(v) => encoded_len_varint(*v),
            Scalar::Fixed32(_) => 4,
            Scalar::Fixed64(_) => 8,
            Scalar::Bytes(b) => encoded_len_varint(b.len() as u64) + b.len(),
        }
    }
}

fn mismatch(kind: KindIndex, value: &Value) -> Error {
    Error::type_mismatch(format_args!("{:?}", kind), value.type_name())
}

fn key_len(number: u32) -> usize {
    encoded_len_varint(u64::from(number << 3))
}

fn delimited_len(number: u32, len: usize) -> usize {
    key_len(number) + encoded_len_varint(len as u64) + len
}

/// The first encoding pass. Computes the length of every message, packed list and map entry,
/// recording them in the order the write pass will need them.
struct Sizer {
    lengths: Vec<usize>,
}

impl Sizer {
    fn message(&mut self, message: &Message, depth: usize) -> Result<usize, Error> {
        if depth > RECURSION_LIMIT {
            return Err(Error::too_deep(RECURSION_LIMIT));
        }

        let mut len = 0;
        for entry in message.descriptor().wire_table().entries() {
            if !message.is_set(entry) {
                continue;
            }

            len += match (entry.shape, message.read_slot(entry)) {
                (Shape::Singular, value) => self.field(entry.number, entry.kind, &value, depth)?,
                (Shape::List, Value::List(list)) => self.list(entry, &list, depth)?,
                (Shape::Map { key, value }, Value::Map(map)) => {
                    self.map(entry.number, key, value, &map, depth)?
                }
                (_, value) => return Err(mismatch(entry.kind, &value)),
            };
        }
        Ok(len)
    }

    /// Reserves a length, to be filled in once it is known.
    fn reserve(&mut self) -> usize {
        self.lengths.push(0);
        self.lengths.len() - 1
    }

    fn nested(&mut self, number: u32, message: &Message, depth: usize) -> Result<usize, Error> {
        let index = self.reserve();
        let len = self.message(message, depth + 1)?;
        self.lengths[index] = len;
        Ok(delimited_len(number, len))
    }

    fn field(
        &mut self,
        number: u32,
        kind: KindIndex,
        value: &Value,
        depth: usize,
    ) -> Result<usize, Error> {
        match value {
            Value::Message(Some(message)) => self.nested(number, message, depth),
            value => Ok(key_len(number) + Scalar::new(kind, value)?.len()),
        }
    }

    fn list(
        &mut self,
        entry: &FieldEntry,
        list: &RepeatedField,
        depth: usize,
    ) -> Result<usize, Error> {
        list.with_values(|values| {
            if entry.kind.is_packable() {
                let index = self.reserve();
                let mut len = 0;
                for value in values {
                    len += Scalar::new(entry.kind, value)?.len();
                }
                self.lengths[index] = len;
                Ok(delimited_len(entry.number, len))
            } else {
                let mut len = 0;
                for value in values {
                    len += self.field(entry.number, entry.kind, value, depth)?;
                }
                Ok(len)
            }
        })
    }

    fn map(
        &mut self,
        number: u32,
        key_kind: KindIndex,
        value_kind: KindIndex,
        map: &MapField,
        depth: usize,
    ) -> Result<usize, Error> {
        let mut len = 0;
        for (key, value) in map.iter() {
            let index = self.reserve();
            let entry_len = self.field(MAP_ENTRY_KEY_NUMBER, key_kind, &key.into(), depth)?
                + self.field(MAP_ENTRY_VALUE_NUMBER, value_kind, &value, depth)?;
            self.lengths[index] = entry_len;
            len += delimited_len(number, entry_len);
        }
        Ok(len)
    }
}

/// A destination for encoded bytes.
pub(crate) trait Sink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

struct BufSink<'a, B>(&'a mut B);

impl<B: BufMut> Sink for BufSink<'_, B> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.0.put_slice(bytes);
        Ok(())
    }
}

struct WriteSink<W>(W);

impl<W: io::Write> Sink for WriteSink<W> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.0.write_all(bytes).map_err(Error::from)
    }
}

/// The second encoding pass. Writes fields in the same order the [`Sizer`] visited them.
struct Writer<'a, S> {
    sink: S,
    lengths: &'a [usize],
    next: usize,
}

impl<S: Sink> Writer<'_, S> {
    fn take_len(&mut self) -> usize {
        let len = self.lengths[self.next];
        self.next += 1;
        len
    }

    fn varint(&mut self, value: u64) -> Result<(), Error> {
        let mut scratch = [0u8; 10];
        let mut buf = &mut scratch[..];
        encode_varint(value, &mut buf);
        let len = 10 - buf.len();
        self.sink.put(&scratch[..len])
    }

    fn key(&mut self, number: u32, wire_type: WireType) -> Result<(), Error> {
        self.varint(u64::from(number << 3 | wire_type as u32))
    }

    fn scalar(&mut self, scalar: &Scalar<'_>) -> Result<(), Error> {
        match *scalar {
            Scalar::Varint(v) => self.varint(v),
            Scalar::Fixed32(v) => self.sink.put(&v.to_le_bytes()),
            Scalar::Fixed64(v) => self.sink.put(&v.to_le_bytes()),
            Scalar::Bytes(b) => {
                self.varint(b.len() as u64)?;
                self.sink.put(b)
            }
        }
    }

    fn message(&mut self, message: &Message) -> Result<(), Error> {
        for entry in message.descriptor().wire_table().entries() {
            if !message.is_set(entry) {
                continue;
            }

            match (entry.shape, message.read_slot(entry)) {
                (Shape::Singular, value) => self.field(entry.number, entry.kind, &value)?,
                (Shape::List, Value::List(list)) => self.list(entry, &list)?,
                (Shape::Map { key, value }, Value::Map(map)) => {
                    self.map(entry.number, key, value, &map)?
                }
                (_, value) => return Err(mismatch(entry.kind, &value)),
            }
        }
        Ok(())
    }

    fn field(&mut self, number: u32, kind: KindIndex, value: &Value) -> Result<(), Error> {
        match value {
            Value::Message(Some(message)) => {
                let len = self.take_len();
                self.key(number, WireType::LengthDelimited)?;
                self.varint(len as u64)?;
                self.message(message)
            }
            value => {
                let scalar = Scalar::new(kind, value)?;
                self.key(number, scalar.wire_type())?;
                self.scalar(&scalar)
            }
        }
    }

    fn list(&mut self, entry: &FieldEntry, list: &RepeatedField) -> Result<(), Error> {
        list.with_values(|values| {
            if entry.kind.is_packable() {
                let len = self.take_len();
                self.key(entry.number, WireType::LengthDelimited)?;
                self.varint(len as u64)?;
                for value in values {
                    self.scalar(&Scalar::new(entry.kind, value)?)?;
                }
            } else {
                for value in values {
                    self.field(entry.number, entry.kind, value)?;
                }
            }
            Ok(())
        })
    }

    fn map(
        &mut self,
        number: u32,
        key_kind: KindIndex,
        value_kind: KindIndex,
        map: &MapField,
    ) -> Result<(), Error> {
        for (key, value) in map.iter() {
            let len = self.take_len();
            self.key(number, WireType::LengthDelimited)?;
            self.varint(len as u64)?;
            self.field(MAP_ENTRY_KEY_NUMBER, key_kind, &key.into())?;
            self.field(MAP_ENTRY_VALUE_NUMBER, value_kind, &value)?;
        }
        Ok(())
    }
}

impl Message {
    /// Returns the length of the binary encoding of this message.
    ///
    /// Fails if the message is nested more than [`RECURSION_LIMIT`] levels deep.
    pub fn encoded_len(&self) -> Result<usize, Error> {
        self.size().map(|(len, _)| len)
    }

    /// Encodes this message into `buf`.
    ///
    /// If `buf` does not have enough capacity for the whole message, or the message is nested
    /// too deeply, an error is returned and nothing is written.
    pub fn encode<B>(&self, buf: &mut B) -> Result<(), Error>
    where
        B: BufMut,
    {
        let (len, lengths) = self.size()?;
        let remaining = buf.remaining_mut();
        if len > remaining {
            return Err(Error::insufficient_capacity(len, remaining));
        }

        self.write_with(BufSink(buf), &lengths)
    }

    /// Encodes this message into a new `Vec`.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, Error> {
        let (len, lengths) = self.size()?;
        let mut buf = Vec::with_capacity(len);
        self.write_with(BufSink(&mut buf), &lengths)?;
        debug_assert_eq!(buf.len(), len);
        Ok(buf)
    }

    /// Encodes this message to `writer`, without buffering the whole encoding.
    ///
    /// If the message is nested too deeply, nothing is written. If `writer` fails, the error is
    /// returned with kind [`Io`](crate::ErrorKind::Io) and part of the message may have been
    /// written.
    pub fn write_to<W>(&self, writer: W) -> Result<(), Error>
    where
        W: io::Write,
    {
        let (_, lengths) = self.size()?;
        self.write_with(WriteSink(writer), &lengths)
    }

    fn size(&self) -> Result<(usize, Vec<usize>), Error> {
        let mut sizer = Sizer {
            lengths: Vec::new(),
        };
        let len = sizer.message(self, 0)?;
        Ok((len, sizer.lengths))
    }

    fn write_with<S: Sink>(&self, sink: S, lengths: &[usize]) -> Result<(), Error> {
        let mut writer = Writer {
            sink,
            lengths,
            next: 0,
        };
        writer.message(self)?;
        debug_assert_eq!(writer.next, lengths.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use super::*;
    use crate::{
        DescriptorPool, ErrorKind, FieldType, FileBuilder, Int64, MessageBuilder, OneofBuilder,
        UInt64,
    };

    static POOL: Lazy<DescriptorPool> = Lazy::new(|| {
        let mut file = FileBuilder::new("encode.proto");
        file.add_message(
            MessageBuilder::new("Scalars")
                .field("int32", 1, FieldType::Int32)
                .field("sint32", 2, FieldType::Sint32)
                .field("sint64", 3, FieldType::Sint64)
                .field("fixed32", 4, FieldType::Fixed32)
                .field("double", 5, FieldType::Double)
                .field("uint64", 6, FieldType::Uint64)
                .repeated("packed", 7, FieldType::Int32)
                .repeated("strings", 8, FieldType::String)
                .map("map", 9, FieldType::String, FieldType::Int32)
                .field("child", 10, FieldType::Message("Scalars".to_owned()))
                .oneof(OneofBuilder::new("o").field("choice", 11, FieldType::Int32)),
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_builder(&mut file).unwrap();
        pool
    });

    fn new() -> Message {
        Message::new(POOL.get_message_by_name("Scalars").unwrap())
    }

    #[test]
    fn varint_forms() {
        let message = new();
        message.set("int32", -1).unwrap();
        message.set("sint32", -1).unwrap();
        message.set("sint64", Int64::new(1)).unwrap();
        message.set("uint64", UInt64::new(300)).unwrap();

        assert_eq!(
            message.encode_to_vec().unwrap(),
            [
                0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01, //
                0x10, 0x01, //
                0x18, 0x02, //
                0x30, 0xac, 0x02,
            ]
        );
    }

    #[test]
    fn fixed_and_negative_zero() {
        let message = new();
        message.set("fixed32", 1u32).unwrap();
        message.set("double", -0.0).unwrap();
        assert_eq!(
            message.encode_to_vec().unwrap(),
            [0x25, 1, 0, 0, 0, 0x29, 0, 0, 0, 0, 0, 0, 0, 0x80]
        );
    }

    #[test]
    fn containers() {
        let message = new();
        let packed = message.get("packed").unwrap();
        packed.as_list().unwrap().extend([1, 150]).unwrap();
        let strings = message.get("strings").unwrap();
        strings.as_list().unwrap().extend(["a", ""]).unwrap();
        let map = message.get("map").unwrap();
        map.as_map().unwrap().set("k", 0).unwrap();

        assert_eq!(
            message.encode_to_vec().unwrap(),
            [
                0x3a, 0x03, 0x01, 0x96, 0x01, //
                0x42, 0x01, b'a', 0x42, 0x00, //
                0x4a, 0x05, 0x0a, 0x01, b'k', 0x10, 0x00,
            ]
        );
    }

    #[test]
    fn oneof_default_is_written() {
        let message = new();
        message.set("choice", 0).unwrap();
        assert_eq!(message.encode_to_vec().unwrap(), [0x58, 0x00]);
    }

    #[test]
    fn nested_lengths() {
        let message = new();
        let child = new();
        let grandchild = new();
        grandchild.set("int32", 1).unwrap();
        child.set("child", grandchild).unwrap();
        child.set("int32", 2).unwrap();
        message.set("child", child).unwrap();

        let bytes = message.encode_to_vec().unwrap();
        assert_eq!(bytes, [0x52, 0x06, 0x08, 0x02, 0x52, 0x02, 0x08, 0x01]);
        assert_eq!(message.encoded_len().unwrap(), bytes.len());

        let mut streamed = Vec::new();
        message.write_to(&mut streamed).unwrap();
        assert_eq!(streamed, bytes);
    }

    #[test]
    fn insufficient_capacity() {
        let message = new();
        message.set("int32", 1).unwrap();

        let mut storage = [0u8; 1];
        let mut buf = &mut storage[..];
        let err = message.encode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(storage, [0]);
    }

    #[test]
    fn failing_writer() {
        struct Closed;

        impl io::Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let message = new();
        message.set("int32", 1).unwrap();
        assert_eq!(message.write_to(Closed).unwrap_err().kind(), ErrorKind::Io);
    }
}
