//! A dynamic runtime for proto3 messages whose types are only known at runtime.
//!
//! Message types are loaded into a [`DescriptorPool`], either from a serialized
//! `FileDescriptorSet` or from a [`FileBuilder`]. Instances of those types are [`Message`]s,
//! which store their fields in a fixed slot layout computed once per type and shared by every
//! instance.
//!
//! Messages can be encoded to and decoded from the protobuf binary format, and with the `serde`
//! feature, serialized in the canonical proto3 JSON mapping.
//!
//! # Example - decoding
//!
//! ```
//! use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, Message, MessageBuilder, Value};
//!
//! let mut file = FileBuilder::new("person.proto");
//! file.package("example")?.add_message(
//!     MessageBuilder::new("Person")
//!         .field("name", 1, FieldType::String)
//!         .field("age", 2, FieldType::Int32),
//! )?;
//!
//! let mut pool = DescriptorPool::new();
//! pool.add_builder(&mut file)?;
//! let desc = pool.get_message_by_name("example.Person").unwrap();
//!
//! let person = Message::decode(desc, [0x0a, 0x03, b'K', b'i', b'm', 0x10, 0x07].as_slice())?;
//! assert_eq!(person.get("name")?, Value::from("Kim"));
//! assert_eq!(person.get("age")?, Value::I32(7));
//! assert_eq!(person.to_string(), r#"example.Person { name: "Kim", age: 7 }"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![cfg_attr(
    feature = "serde",
    doc = r##"
# Example - JSON mapping

```
# use prost_dynamic::{DescriptorPool, FieldType, FileBuilder, Message, MessageBuilder};
# let mut file = FileBuilder::new("counts.proto");
# file.add_message(MessageBuilder::new("Counts").map("m", 1, FieldType::String, FieldType::Int32))?;
# let mut pool = DescriptorPool::new();
# pool.add_builder(&mut file)?;
let desc = pool.get_message_by_name("Counts").unwrap();

let mut deserializer = serde_json::Deserializer::from_str(r#"{"m":{"b":2,"a":1}}"#);
let message = Message::deserialize(desc, &mut deserializer)?;
deserializer.end()?;

assert_eq!(serde_json::to_string(&message)?, r#"{"m":{"a":1,"b":2}}"#);
# Ok::<(), Box<dyn std::error::Error>>(())
```
"##
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

#[cfg(feature = "serde1")]
extern crate serde1 as serde;

mod codec;
mod descriptor;
mod dynamic;
mod error;
mod int64;
mod layout;

pub use {prost, prost::bytes, prost_types};

pub use self::codec::RECURSION_LIMIT;
pub use self::descriptor::{
    Cardinality, Descriptor, DescriptorError, DescriptorId, DescriptorPool, EnumBuilder,
    EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FieldType, FileBuilder, FileDescriptor,
    Kind, MessageBuilder, MessageDescriptor, OneofBuilder, OneofDescriptor, Syntax,
};
pub use self::dynamic::{
    FieldRef, Initializer, MapField, MapKey, Message, RepeatedField, Value,
};
pub use self::error::{Error, ErrorKind};
pub use self::int64::{Boxed64, Int64, UInt64};
pub use self::layout::{MessageLayout, OneofSlots, RESERVED_SLOTS};

#[cfg(feature = "serde")]
pub use self::dynamic::{DeserializeOptions, SerializeOptions};
