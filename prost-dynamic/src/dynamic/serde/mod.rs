mod de;
mod ser;

use serde::{
    de::{DeserializeSeed, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::{Message, MessageDescriptor};

/// How [`Message::serialize_with_options`] writes JSON.
#[derive(Debug, Clone)]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub struct SerializeOptions {
    stringify_64_bit_integers: bool,
    use_enum_numbers: bool,
    use_proto_field_name: bool,
    skip_default_fields: bool,
}

/// How [`Message::deserialize_with_options`] reads JSON.
#[derive(Debug, Clone)]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub struct DeserializeOptions {
    deny_unknown_fields: bool,
}

#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for Message {
    /// Writes the message in the canonical proto3 JSON mapping.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.serialize_with_options(serializer, &SerializeOptions::new())
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> DeserializeSeed<'de> for MessageDescriptor {
    type Value = Message;

    /// Reads a message of this type from the canonical proto3 JSON mapping.
    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Message::deserialize(self, deserializer)
    }
}

impl Message {
    /// Writes the message as JSON, adjusted by `options`.
    ///
    /// Fails without writing anything if messages are nested more than
    /// [`RECURSION_LIMIT`](crate::RECURSION_LIMIT) levels deep.
    ///
    /// # Examples
    ///
    /// ```
    /// # use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, Message, MessageBuilder, SerializeOptions};
    /// let mut file = FileBuilder::new("example.proto");
    /// file.add_message(MessageBuilder::new("Counter").field("total_count", 1, FieldType::Int64))?;
    /// let mut pool = DescriptorPool::new();
    /// pool.add_builder(&mut file)?;
    ///
    /// let message = Message::new(pool.get_message_by_name("Counter").unwrap());
    /// message.set("total_count", 12i64)?;
    ///
    /// let json = serde_json::to_string(&message)?;
    /// assert_eq!(json, r#"{"totalCount":"12"}"#);
    ///
    /// let options = SerializeOptions::new()
    ///     .stringify_64_bit_integers(false)
    ///     .use_proto_field_name(true);
    /// let json = message.serialize_with_options(serde_json::value::Serializer, &options)?;
    /// assert_eq!(json, serde_json::json!({ "total_count": 12 }));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn serialize_with_options<S>(
        &self,
        serializer: S,
        options: &SerializeOptions,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser::serialize_message(self, serializer, options)
    }

    /// Reads a message of type `desc` from JSON.
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn deserialize<'de, D>(desc: MessageDescriptor, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::deserialize_with_options(desc, deserializer, &DeserializeOptions::new())
    }

    /// Reads a message of type `desc` from JSON, adjusted by `options`.
    ///
    /// Every value is converted to its field type as if by [`Message::set`], so a value of the
    /// wrong type is reported as a deserialization error.
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    pub fn deserialize_with_options<'de, D>(
        desc: MessageDescriptor,
        deserializer: D,
        options: &DeserializeOptions,
    ) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        de::deserialize_message(&desc, deserializer, options, 0)
    }
}

impl DeserializeOptions {
    /// The options of the canonical JSON mapping.
    pub const fn new() -> Self {
        DeserializeOptions {
            deny_unknown_fields: true,
        }
    }

    /// Reject object keys that name no field of the message. When off, such keys and their
    /// values are skipped.
    ///
    /// On by default.
    pub const fn deny_unknown_fields(mut self, yes: bool) -> Self {
        self.deny_unknown_fields = yes;
        self
    }
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializeOptions {
    /// The options of the canonical JSON mapping.
    pub const fn new() -> Self {
        SerializeOptions {
            stringify_64_bit_integers: true,
            use_enum_numbers: false,
            use_proto_field_name: false,
            skip_default_fields: true,
        }
    }

    /// Write `int64`, `uint64` and the other 64-bit kinds as JSON strings.
    ///
    /// Many JSON readers parse every number as a double and lose precision past 2^53. Turning
    /// this off writes plain numbers.
    ///
    /// On by default.
    pub const fn stringify_64_bit_integers(mut self, yes: bool) -> Self {
        self.stringify_64_bit_integers = yes;
        self
    }

    /// Write enum fields as numbers rather than value names.
    ///
    /// A number with no declared name is written as a number either way. Off by default.
    pub const fn use_enum_numbers(mut self, yes: bool) -> Self {
        self.use_enum_numbers = yes;
        self
    }

    /// Key objects by the field name from the `.proto` file instead of its JSON name.
    ///
    /// Off by default.
    pub const fn use_proto_field_name(mut self, yes: bool) -> Self {
        self.use_proto_field_name = yes;
        self
    }

    /// Leave out fields that are not set.
    ///
    /// When off, unset fields are written with their default value. Unset message fields and
    /// oneof members that are not selected are still left out.
    ///
    /// On by default.
    pub const fn skip_default_fields(mut self, yes: bool) -> Self {
        self.skip_default_fields = yes;
        self
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::new()
    }
}
