use std::{borrow::Cow, fmt, io};

/// The category of an [`Error`] or [`DescriptorError`][crate::DescriptorError].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A value does not fit the type of its target field or container.
    TypeMismatch,
    /// A numeric value is out of range for its target type.
    Range,
    /// A field was accessed by a name or number that its message does not define.
    UnknownField,
    /// A type named in a descriptor is not defined in the pool.
    UnresolvedReference,
    /// Two definitions share a fully-qualified name.
    DuplicateName,
    /// A field or enum definition is malformed.
    InvalidField,
    /// A field with the proto2 `required` label was found.
    Proto2RequiredNotSupported,
    /// The recursion limit was reached while encoding or decoding.
    CyclicOrTooDeep,
    /// Input bytes or JSON are truncated, mis-tagged or otherwise malformed.
    MalformedWire,
    /// A descriptor was modified after being added to a pool.
    FrozenMutation,
    /// Two messages of different types were combined.
    DescriptorMismatch,
    /// A serialized descriptor set could not be parsed.
    ParseError,
    /// The output sink failed or ran out of space.
    Io,
}

/// An error that may occur while accessing, converting, encoding or decoding a
/// [`Message`][crate::Message].
#[derive(Debug)]
pub struct Error {
    inner: Box<ErrorImpl>,
}

#[derive(Debug)]
enum ErrorImpl {
    TypeMismatch {
        expected: String,
        found: String,
    },
    InvalidInteger {
        value: String,
    },
    Range {
        value: String,
        target: &'static str,
    },
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
    UnknownField {
        message: String,
        field: String,
    },
    UnknownOneof {
        message: String,
        oneof: String,
    },
    DescriptorMismatch {
        expected: String,
        found: String,
    },
    TooDeep {
        limit: usize,
    },
    MalformedWire {
        reason: Cow<'static, str>,
    },
    Decode {
        err: prost::DecodeError,
    },
    InsufficientCapacity {
        required: usize,
        remaining: usize,
    },
    Io {
        err: io::Error,
    },
}

impl Error {
    fn new(inner: ErrorImpl) -> Self {
        Error {
            inner: Box::new(inner),
        }
    }

    pub(crate) fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Error::new(ErrorImpl::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }

    pub(crate) fn invalid_integer(value: &str) -> Self {
        Error::new(ErrorImpl::InvalidInteger {
            value: value.to_owned(),
        })
    }

    pub(crate) fn range(value: impl fmt::Display, target: &'static str) -> Self {
        Error::new(ErrorImpl::Range {
            value: value.to_string(),
            target,
        })
    }

    pub(crate) fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Error::new(ErrorImpl::IndexOutOfBounds { index, len })
    }

    pub(crate) fn unknown_field(message: &str, field: impl fmt::Display) -> Self {
        Error::new(ErrorImpl::UnknownField {
            message: message.to_owned(),
            field: field.to_string(),
        })
    }

    pub(crate) fn unknown_oneof(message: &str, oneof: &str) -> Self {
        Error::new(ErrorImpl::UnknownOneof {
            message: message.to_owned(),
            oneof: oneof.to_owned(),
        })
    }

    pub(crate) fn descriptor_mismatch(expected: &str, found: &str) -> Self {
        Error::new(ErrorImpl::DescriptorMismatch {
            expected: expected.to_owned(),
            found: found.to_owned(),
        })
    }

    pub(crate) fn too_deep(limit: usize) -> Self {
        Error::new(ErrorImpl::TooDeep { limit })
    }

    pub(crate) fn malformed(reason: impl Into<Cow<'static, str>>) -> Self {
        Error::new(ErrorImpl::MalformedWire {
            reason: reason.into(),
        })
    }

    pub(crate) fn insufficient_capacity(required: usize, remaining: usize) -> Self {
        Error::new(ErrorImpl::InsufficientCapacity {
            required,
            remaining,
        })
    }

    /// Gets the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match &*self.inner {
            ErrorImpl::TypeMismatch { .. } | ErrorImpl::InvalidInteger { .. } => {
                ErrorKind::TypeMismatch
            }
            ErrorImpl::Range { .. } | ErrorImpl::IndexOutOfBounds { .. } => ErrorKind::Range,
            ErrorImpl::UnknownField { .. } | ErrorImpl::UnknownOneof { .. } => {
                ErrorKind::UnknownField
            }
            ErrorImpl::DescriptorMismatch { .. } => ErrorKind::DescriptorMismatch,
            ErrorImpl::TooDeep { .. } => ErrorKind::CyclicOrTooDeep,
            ErrorImpl::MalformedWire { .. } | ErrorImpl::Decode { .. } => ErrorKind::MalformedWire,
            ErrorImpl::InsufficientCapacity { .. } | ErrorImpl::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::new(ErrorImpl::Decode { err })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(ErrorImpl::Io { err })
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.inner {
            ErrorImpl::Decode { err } => Some(err),
            ErrorImpl::Io { err } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorImpl::TypeMismatch { expected, found } => {
                write!(f, "expected a value of type '{}', but found '{}'", expected, found)
            }
            ErrorImpl::InvalidInteger { value } => {
                write!(f, "'{}' is not a valid decimal integer", value)
            }
            ErrorImpl::Range { value, target } => {
                write!(f, "value '{}' is out of range for type '{}'", value, target)
            }
            ErrorImpl::IndexOutOfBounds { index, len } => {
                write!(f, "index {} is out of bounds for length {}", index, len)
            }
            ErrorImpl::UnknownField { message, field } => {
                write!(f, "message '{}' has no field '{}'", message, field)
            }
            ErrorImpl::UnknownOneof { message, oneof } => {
                write!(f, "message '{}' has no oneof '{}'", message, oneof)
            }
            ErrorImpl::DescriptorMismatch { expected, found } => {
                write!(
                    f,
                    "expected a message of type '{}', but found '{}'",
                    expected, found
                )
            }
            ErrorImpl::TooDeep { limit } => write!(
                f,
                "exceeded the recursion limit of {}, perhaps a cycle exists in the message graph",
                limit
            ),
            ErrorImpl::MalformedWire { reason } => write!(f, "malformed input: {}", reason),
            ErrorImpl::Decode { err } => write!(f, "malformed input: {}", err),
            ErrorImpl::InsufficientCapacity {
                required,
                remaining,
            } => write!(
                f,
                "insufficient buffer capacity (required: {}, remaining: {})",
                required, remaining
            ),
            ErrorImpl::Io { .. } => write!(f, "failed to write to the output sink"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::Range => "range",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::UnresolvedReference => "unresolved_reference",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::InvalidField => "invalid_field",
            ErrorKind::Proto2RequiredNotSupported => "proto2_required_not_supported",
            ErrorKind::CyclicOrTooDeep => "cyclic_or_too_deep",
            ErrorKind::MalformedWire => "malformed_wire",
            ErrorKind::FrozenMutation => "frozen_mutation",
            ErrorKind::DescriptorMismatch => "descriptor_mismatch",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::Io => "io",
        })
    }
}

#[cfg(feature = "miette")]
#[cfg_attr(docsrs, doc(cfg(feature = "miette")))]
impl miette::Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match &*self.inner {
            ErrorImpl::TypeMismatch { expected, .. } if expected.contains("64") => Some(Box::new(
                "64-bit fields take an Int64 or UInt64 value",
            )),
            ErrorImpl::TooDeep { .. } => Some(Box::new(
                "check for a message that was assigned into one of its own descendants",
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::range(300, "int32").kind(), ErrorKind::Range);
        assert_eq!(
            Error::type_mismatch("int32", "string").kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(Error::too_deep(100).kind(), ErrorKind::CyclicOrTooDeep);
        assert_eq!(Error::malformed("bad tag").kind(), ErrorKind::MalformedWire);
        assert_eq!(
            Error::from(io::Error::new(io::ErrorKind::Other, "closed")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::range(-1, "uint32").to_string(),
            "value '-1' is out of range for type 'uint32'"
        );
        assert_eq!(ErrorKind::CyclicOrTooDeep.to_string(), "cyclic_or_too_deep");
    }
}
