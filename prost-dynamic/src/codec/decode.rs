use prost::{
    bytes::Buf,
    encoding::{decode_key, decode_varint, skip_field, DecodeContext, WireType},
};

use crate::{
    codec::{Shape, RECURSION_LIMIT},
    descriptor::{KindIndex, MAP_ENTRY_KEY_NUMBER, MAP_ENTRY_VALUE_NUMBER},
    DescriptorPool, Error, Int64, MapField, Message, MessageDescriptor, RepeatedField, UInt64,
    Value,
};

/// A length-delimited scope being decoded. `end` is the value of [`Buf::remaining`] at which the
/// scope is complete.
enum Frame {
    Message {
        message: Message,
        end: usize,
        depth: usize,
    },
    Packed {
        list: RepeatedField,
        kind: KindIndex,
        end: usize,
    },
    MapEntry {
        map: MapField,
        key: Value,
        value: Value,
        kinds: (KindIndex, KindIndex),
        end: usize,
        depth: usize,
    },
}

impl Frame {
    fn message(message: Message, end: usize, depth: usize) -> Result<Self, Error> {
        if depth > RECURSION_LIMIT {
            return Err(Error::too_deep(RECURSION_LIMIT));
        }
        Ok(Frame::Message {
            message,
            end,
            depth,
        })
    }

    fn end(&self) -> usize {
        match *self {
            Frame::Message { end, .. } | Frame::Packed { end, .. } | Frame::MapEntry { end, .. } => {
                end
            }
        }
    }

    /// Reads one field, or one element of a packed list. Returns the scope of the field if it is
    /// length-delimited and has to be decoded further.
    fn step<B: Buf>(&mut self, pool: &DescriptorPool, buf: &mut B) -> Result<Option<Frame>, Error> {
        match self {
            Frame::Message {
                message,
                end,
                depth,
            } => message_field(pool, message, *end, *depth, buf),
            Frame::Packed { list, kind, .. } => {
                let value = read_scalar(*kind, wire_type(*kind), buf)?;
                list.push_converted(value);
                Ok(None)
            }
            Frame::MapEntry {
                key,
                value,
                kinds: (key_kind, value_kind),
                end,
                depth,
                ..
            } => {
                let (number, wire) = decode_key(buf)?;
                match (number, *value_kind) {
                    (MAP_ENTRY_KEY_NUMBER, _) => {
                        *key = read_scalar(*key_kind, wire, buf)?;
                        Ok(None)
                    }
                    (MAP_ENTRY_VALUE_NUMBER, KindIndex::Message(index)) => {
                        let child_end = read_len(wire, buf, *end)?;
                        let child = match value {
                            Value::Message(Some(child)) => child.clone(),
                            _ => {
                                let child = Message::new(pool.message(index));
                                *value = Value::Message(Some(child.clone()));
                                child
                            }
                        };
                        Frame::message(child, child_end, *depth + 1).map(Some)
                    }
                    (MAP_ENTRY_VALUE_NUMBER, kind) => {
                        *value = read_scalar(kind, wire, buf)?;
                        Ok(None)
                    }
                    _ => {
                        skip_field(wire, number, buf, DecodeContext::default())?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Completes the scope once all of its bytes have been read.
    fn finish(self, pool: &DescriptorPool) -> Result<(), Error> {
        match self {
            Frame::MapEntry {
                map,
                key,
                value,
                kinds: (_, value_kind),
                ..
            } => {
                let value = match (value, value_kind) {
                    (Value::Message(None), KindIndex::Message(index)) => {
                        Value::Message(Some(Message::new(pool.message(index))))
                    }
                    (value, _) => value,
                };
                map.set_value(key, value)
            }
            Frame::Message { .. } | Frame::Packed { .. } => Ok(()),
        }
    }
}

fn message_field<B: Buf>(
    pool: &DescriptorPool,
    message: &Message,
    end: usize,
    depth: usize,
    buf: &mut B,
) -> Result<Option<Frame>, Error> {
    let (number, wire) = decode_key(buf)?;
    let Some(entry) = message.descriptor().wire_table().get(number) else {
        skip_field(wire, number, buf, DecodeContext::default())?;
        return Ok(None);
    };

    match (entry.shape, entry.kind) {
        (Shape::Singular, KindIndex::Message(index)) => {
            let child_end = read_len(wire, buf, end)?;
            let child = match message.read_slot(entry) {
                Value::Message(Some(child)) => child,
                _ => {
                    let child = Message::new(pool.message(index));
                    message.write_slot(entry, Value::Message(Some(child.clone())));
                    child
                }
            };
            Frame::message(child, child_end, depth + 1).map(Some)
        }
        (Shape::Singular, kind) => {
            let value = read_scalar(kind, wire, buf)?;
            message.write_slot(entry, value);
            Ok(None)
        }
        (Shape::List, kind) => {
            let Value::List(list) = message.read_slot(entry) else {
                return Err(Error::type_mismatch("list", message.read_slot(entry).type_name()));
            };
            match kind {
                KindIndex::Message(index) => {
                    let child_end = read_len(wire, buf, end)?;
                    let child = Message::new(pool.message(index));
                    list.push_converted(Value::Message(Some(child.clone())));
                    Frame::message(child, child_end, depth + 1).map(Some)
                }
                kind if kind.is_packable() && wire == WireType::LengthDelimited => {
                    let end = read_len(wire, buf, end)?;
                    Ok(Some(Frame::Packed { list, kind, end }))
                }
                kind => {
                    list.push_converted(read_scalar(kind, wire, buf)?);
                    Ok(None)
                }
            }
        }
        (Shape::Map { key, value }, _) => {
            let Value::Map(map) = message.read_slot(entry) else {
                return Err(Error::type_mismatch("map", message.read_slot(entry).type_name()));
            };
            let entry_end = read_len(wire, buf, end)?;
            Ok(Some(Frame::MapEntry {
                map,
                key: Value::default_value_for_index(pool, key),
                value: Value::default_value_for_index(pool, value),
                kinds: (key, value),
                end: entry_end,
                depth,
            }))
        }
    }
}

fn wire_type(kind: KindIndex) -> WireType {
    match kind {
        KindIndex::Double | KindIndex::Fixed64 | KindIndex::Sfixed64 => WireType::SixtyFourBit,
        KindIndex::Float | KindIndex::Fixed32 | KindIndex::Sfixed32 => WireType::ThirtyTwoBit,
        KindIndex::String | KindIndex::Bytes | KindIndex::Message(_) => WireType::LengthDelimited,
        _ => WireType::Varint,
    }
}

fn check_wire_type(kind: KindIndex, actual: WireType) -> Result<(), Error> {
    let expected = wire_type(kind);
    if actual == expected {
        Ok(())
    } else {
        Err(Error::malformed(format!(
            "invalid wire type {:?} for field of type {:?}, expected {:?}",
            actual, kind, expected
        )))
    }
}

/// Reads the length of a length-delimited field, returning the value of [`Buf::remaining`] at
/// which the field ends.
fn read_len<B: Buf>(wire: WireType, buf: &mut B, end: usize) -> Result<usize, Error> {
    if wire != WireType::LengthDelimited {
        return Err(Error::malformed(format!(
            "invalid wire type {:?} for a length-delimited field",
            wire
        )));
    }

    let len = decode_varint(buf)?;
    let available = buf.remaining().saturating_sub(end);
    if len > available as u64 {
        return Err(Error::malformed(
            "length-delimited field overruns its enclosing message",
        ));
    }
    Ok(buf.remaining() - len as usize)
}

fn need<B: Buf>(buf: &B, len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        Err(Error::malformed("buffer underflow"))
    } else {
        Ok(())
    }
}

fn read_scalar<B: Buf>(kind: KindIndex, wire: WireType, buf: &mut B) -> Result<Value, Error> {
    check_wire_type(kind, wire)?;

    Ok(match kind {
        KindIndex::Int32 => Value::I32(decode_varint(buf)? as i32),
        KindIndex::Int64 => Value::I64(Int64::new(decode_varint(buf)? as i64)),
        KindIndex::Uint32 => Value::U32(decode_varint(buf)? as u32),
        KindIndex::Uint64 => Value::U64(UInt64::new(decode_varint(buf)?)),
        KindIndex::Sint32 => {
            let n = decode_varint(buf)? as u32;
            Value::I32((n >> 1) as i32 ^ -((n & 1) as i32))
        }
        KindIndex::Sint64 => {
            let n = decode_varint(buf)?;
            Value::I64(Int64::new((n >> 1) as i64 ^ -((n & 1) as i64)))
        }
        KindIndex::Bool => Value::Bool(decode_varint(buf)? != 0),
        KindIndex::Enum(_) => Value::EnumNumber(decode_varint(buf)? as i32),
        KindIndex::Fixed32 => {
            need(buf, 4)?;
            Value::U32(buf.get_u32_le())
        }
        KindIndex::Sfixed32 => {
            need(buf, 4)?;
            Value::I32(buf.get_i32_le())
        }
        KindIndex::Float => {
            need(buf, 4)?;
            Value::F32(buf.get_f32_le())
        }
        KindIndex::Fixed64 => {
            need(buf, 8)?;
            Value::U64(UInt64::new(buf.get_u64_le()))
        }
        KindIndex::Sfixed64 => {
            need(buf, 8)?;
            Value::I64(Int64::new(buf.get_i64_le()))
        }
        KindIndex::Double => {
            need(buf, 8)?;
            Value::F64(buf.get_f64_le())
        }
        KindIndex::String => {
            let len = read_delimited_len(buf)?;
            Value::String(read_string(buf, len)?)
        }
        KindIndex::Bytes => {
            let len = read_delimited_len(buf)?;
            Value::Bytes(buf.copy_to_bytes(len))
        }
        KindIndex::Message(_) => {
            return Err(Error::malformed("message fields are not scalars"));
        }
    })
}

fn read_delimited_len<B: Buf>(buf: &mut B) -> Result<usize, Error> {
    let len = decode_varint(buf)?;
    if len > buf.remaining() as u64 {
        return Err(Error::malformed("buffer underflow"));
    }
    Ok(len as usize)
}

/// Reads a string chunk by chunk, validating it once complete.
fn read_string<B: Buf>(buf: &mut B, len: usize) -> Result<String, Error> {
    let mut bytes = Vec::with_capacity(len);
    while bytes.len() < len {
        let chunk = buf.chunk();
        let take = chunk.len().min(len - bytes.len());
        if take == 0 {
            return Err(Error::malformed("buffer underflow"));
        }
        bytes.extend_from_slice(&chunk[..take]);
        buf.advance(take);
    }

    String::from_utf8(bytes).map_err(|_| Error::malformed("invalid UTF-8 in string field"))
}

fn merge_into<B: Buf>(message: &Message, buf: &mut B) -> Result<(), Error> {
    let pool = message.descriptor().parent_pool().clone();
    let mut stack = vec![Frame::message(message.clone(), 0, 0)?];

    while let Some(frame) = stack.last_mut() {
        let remaining = buf.remaining();
        let end = frame.end();
        if remaining == end {
            if let Some(frame) = stack.pop() {
                frame.finish(&pool)?;
            }
            continue;
        }
        if remaining < end {
            return Err(Error::malformed(
                "field overruns the end of its enclosing message",
            ));
        }

        if let Some(child) = frame.step(&pool, buf)? {
            stack.push(child);
        }
    }

    Ok(())
}

impl Message {
    /// Decodes a message of type `desc` from its binary encoding.
    ///
    /// Unknown fields are skipped. Fails with [`MalformedWire`](crate::ErrorKind::MalformedWire)
    /// if the input is truncated or invalid, or with
    /// [`CyclicOrTooDeep`](crate::ErrorKind::CyclicOrTooDeep) if messages are nested more than
    /// [`RECURSION_LIMIT`] levels deep.
    pub fn decode<B>(desc: MessageDescriptor, mut buf: B) -> Result<Message, Error>
    where
        B: Buf,
    {
        let message = Message::new(desc);
        merge_into(&message, &mut buf)?;
        Ok(message)
    }

    /// Decodes fields from `buf` and merges them into this message.
    ///
    /// Singular fields are overwritten, repeated fields are appended to and submessages that are
    /// already set are merged into. If an error is returned, this message may have been partially
    /// updated.
    pub fn merge<B>(&self, mut buf: B) -> Result<(), Error>
    where
        B: Buf,
    {
        merge_into(self, &mut buf)
    }
}
