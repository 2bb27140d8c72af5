//! The binary wire codec, and the per-type tables shared by both codecs.

mod decode;
mod encode;
mod tables;

use once_cell::sync::OnceCell;

pub(crate) use self::tables::{FieldEntry, Shape, WireTable};
#[cfg(feature = "serde")]
pub(crate) use self::tables::JsonTable;

use crate::MessageLayout;

/// The maximum depth of nested messages accepted by the encoders and decoders.
pub const RECURSION_LIMIT: usize = 100;

/// Lazily computed data attached to each message type in a pool.
///
/// Entries only refer to other definitions by index, so caching them inside the pool does not
/// create reference cycles.
#[derive(Clone, Default)]
pub(crate) struct TableCache {
    pub(crate) layout: OnceCell<MessageLayout>,
    pub(crate) wire: OnceCell<WireTable>,
    #[cfg(feature = "serde")]
    pub(crate) json: OnceCell<JsonTable>,
}
