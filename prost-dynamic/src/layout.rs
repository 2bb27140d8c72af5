//! Slot layout of message instances.

use crate::{
    descriptor::{FieldIndex, OneofIndex},
    FieldDescriptor, MessageDescriptor, OneofDescriptor,
};

/// The number of slots at the start of every message that are not assigned to any field.
pub const RESERVED_SLOTS: usize = 0;

/// Maps every field of a message type to a slot index in its instances.
///
/// Fields outside a oneof get one slot each, in definition order. Repeated and map fields hold
/// their container in a single slot. Each oneof then gets two slots: one holding the value of
/// whichever member is set, shared by all its members, and one holding the number of that member,
/// or `0` when no member is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    reserved: usize,
    field_slots: Box<[usize]>,
    oneof_slots: Box<[OneofSlots]>,
    slot_count: usize,
}

/// The pair of slots assigned to a oneof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OneofSlots {
    /// Holds the value of the member that is set.
    pub value: usize,
    /// Holds the number of the member that is set, or `0`.
    pub case: usize,
}

impl MessageLayout {
    /// Computes the layout of `desc`, leaving the first `reserved` slots unassigned.
    pub fn new(desc: &MessageDescriptor, reserved: usize) -> Self {
        let mut next = reserved;

        let mut field_slots = vec![usize::MAX; desc.fields().len()];
        for field in desc.fields() {
            if field.oneof_index().is_none() {
                field_slots[field.index() as usize] = next;
                next += 1;
            }
        }

        let mut oneof_slots = Vec::with_capacity(desc.oneofs().len());
        for oneof in desc.oneofs() {
            let slots = OneofSlots {
                value: next,
                case: next + 1,
            };
            next += 2;

            for field in oneof.fields() {
                field_slots[field.index() as usize] = slots.value;
            }
            oneof_slots.push(slots);
        }

        debug_assert!(field_slots.iter().all(|&slot| slot != usize::MAX));
        MessageLayout {
            reserved,
            field_slots: field_slots.into(),
            oneof_slots: oneof_slots.into(),
            slot_count: next,
        }
    }

    /// The total number of slots in an instance, including reserved slots.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The number of reserved slots at the start of an instance.
    pub fn reserved_slots(&self) -> usize {
        self.reserved
    }

    /// Gets the slot holding the value of `field`. For a oneof member this is the value slot of
    /// its oneof.
    ///
    /// # Panics
    ///
    /// May panic if `field` belongs to a different message type.
    pub fn field_slot(&self, field: &FieldDescriptor) -> usize {
        self.slot(field.index())
    }

    /// Gets the value and case slots of `oneof`.
    ///
    /// # Panics
    ///
    /// May panic if `oneof` belongs to a different message type.
    pub fn oneof_slots(&self, oneof: &OneofDescriptor) -> OneofSlots {
        self.oneof(oneof.index())
    }

    pub(crate) fn slot(&self, field: FieldIndex) -> usize {
        self.field_slots[field as usize]
    }

    pub(crate) fn oneof(&self, oneof: OneofIndex) -> OneofSlots {
        self.oneof_slots[oneof as usize]
    }
}

impl MessageDescriptor {
    /// Gets the slot layout of instances of this message type.
    ///
    /// The layout is computed on first use and cached for the lifetime of the pool.
    pub fn layout(&self) -> &MessageLayout {
        self.tables().layout.get_or_init(|| {
            let layout = MessageLayout::new(self, RESERVED_SLOTS);
            tracing::trace!(
                message = self.full_name(),
                slots = layout.slot_count(),
                "computed message layout"
            );
            layout
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DescriptorPool, FieldType, FileBuilder, MessageBuilder, OneofBuilder};

    fn message() -> MessageDescriptor {
        let mut file = FileBuilder::new("layout.proto");
        file.add_message(
            MessageBuilder::new("M")
                .field("a", 3, FieldType::Int32)
                .oneof(
                    OneofBuilder::new("o")
                        .field("x", 5, FieldType::Int32)
                        .field("y", 6, FieldType::String),
                )
                .repeated("b", 1, FieldType::String)
                .map("c", 2, FieldType::String, FieldType::Int32),
        )
        .unwrap();
        let mut pool = DescriptorPool::new();
        pool.add_builder(&mut file).unwrap();
        pool.get_message_by_name("M").unwrap()
    }

    #[test]
    fn definition_order() {
        let desc = message();
        let layout = desc.layout();

        let slot = |name: &str| layout.field_slot(&desc.get_field_by_name(name).unwrap());
        assert_eq!(slot("a"), 0);
        assert_eq!(slot("b"), 1);
        assert_eq!(slot("c"), 2);

        let oneof = layout.oneof_slots(&desc.get_oneof_by_name("o").unwrap());
        assert_eq!(oneof, OneofSlots { value: 3, case: 4 });
        assert_eq!(slot("x"), 3);
        assert_eq!(slot("y"), 3);
        assert_eq!(layout.slot_count(), 5);
    }

    #[test]
    fn reserved() {
        let desc = message();
        let layout = MessageLayout::new(&desc, 2);
        assert_eq!(layout.reserved_slots(), 2);
        assert_eq!(layout.slot_count(), 7);
        assert_eq!(layout.field_slot(&desc.get_field(3).unwrap()), 2);
    }

    #[test]
    fn cached() {
        let desc = message();
        assert!(std::ptr::eq(desc.layout(), desc.layout()));
    }
}
