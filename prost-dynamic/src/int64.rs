//! Boxed 64-bit integers.
//!
//! [`Int64`] and [`UInt64`] carry the full range of the protobuf `int64` and `uint64` families,
//! with lossless decimal parsing and 32-bit high/low decomposition for hosts that cannot
//! represent 64-bit integers natively.

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::Error;

/// A boxed signed 64-bit integer, the storage type of `int64`, `sint64` and `sfixed64` fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Int64(i64);

/// A boxed unsigned 64-bit integer, the storage type of `uint64` and `fixed64` fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UInt64(u64);

/// A boxed 64-bit integer of either signedness. This trait is sealed.
pub trait Boxed64: sealed::Sealed + Copy {
    #[doc(hidden)]
    fn widen(self) -> i128;
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Int64 {}
    impl Sealed for super::UInt64 {}
}

impl Int64 {
    /// The smallest value.
    pub const MIN: Int64 = Int64(i64::MIN);
    /// The largest value.
    pub const MAX: Int64 = Int64(i64::MAX);

    /// Boxes a signed integer.
    pub const fn new(value: i64) -> Self {
        Int64(value)
    }

    /// Gets the boxed value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// The high 32 bits of the two's complement representation.
    pub const fn hi(self) -> u32 {
        (self.0 as u64 >> 32) as u32
    }

    /// The low 32 bits of the two's complement representation.
    pub const fn lo(self) -> u32 {
        self.0 as u64 as u32
    }

    /// Joins a value from its high and low 32 bits.
    pub const fn from_parts(hi: u32, lo: u32) -> Self {
        Int64(((hi as u64) << 32 | lo as u64) as i64)
    }

    /// Compares against a boxed integer of either signedness.
    ///
    /// `compare(..) as i8` yields `-1`, `0` or `1`.
    pub fn compare<T: Boxed64>(&self, other: &T) -> Ordering {
        self.widen().cmp(&other.widen())
    }
}

impl UInt64 {
    /// The smallest value.
    pub const MIN: UInt64 = UInt64(u64::MIN);
    /// The largest value.
    pub const MAX: UInt64 = UInt64(u64::MAX);

    /// Boxes an unsigned integer.
    pub const fn new(value: u64) -> Self {
        UInt64(value)
    }

    /// Gets the boxed value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The high 32 bits.
    pub const fn hi(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The low 32 bits.
    pub const fn lo(self) -> u32 {
        self.0 as u32
    }

    /// Joins a value from its high and low 32 bits.
    pub const fn from_parts(hi: u32, lo: u32) -> Self {
        UInt64((hi as u64) << 32 | lo as u64)
    }

    /// Compares against a boxed integer of either signedness.
    ///
    /// `compare(..) as i8` yields `-1`, `0` or `1`.
    pub fn compare<T: Boxed64>(&self, other: &T) -> Ordering {
        self.widen().cmp(&other.widen())
    }
}

impl Boxed64 for Int64 {
    fn widen(self) -> i128 {
        self.0.into()
    }
}

impl Boxed64 for UInt64 {
    fn widen(self) -> i128 {
        self.0.into()
    }
}

impl From<i64> for Int64 {
    fn from(value: i64) -> Self {
        Int64(value)
    }
}

impl From<Int64> for i64 {
    fn from(value: Int64) -> Self {
        value.0
    }
}

impl From<u64> for UInt64 {
    fn from(value: u64) -> Self {
        UInt64(value)
    }
}

impl From<UInt64> for u64 {
    fn from(value: UInt64) -> Self {
        value.0
    }
}

impl TryFrom<UInt64> for Int64 {
    type Error = Error;

    fn try_from(value: UInt64) -> Result<Self, Error> {
        i64::try_from(value.0)
            .map(Int64)
            .map_err(|_| Error::range(value, "int64"))
    }
}

impl TryFrom<Int64> for UInt64 {
    type Error = Error;

    fn try_from(value: Int64) -> Result<Self, Error> {
        u64::try_from(value.0)
            .map(UInt64)
            .map_err(|_| Error::range(value, "uint64"))
    }
}

impl PartialEq<UInt64> for Int64 {
    fn eq(&self, other: &UInt64) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialEq<Int64> for UInt64 {
    fn eq(&self, other: &Int64) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl PartialOrd<UInt64> for Int64 {
    fn partial_cmp(&self, other: &UInt64) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl PartialOrd<Int64> for UInt64 {
    fn partial_cmp(&self, other: &Int64) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl FromStr for Int64 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (negative, magnitude) = parse_decimal(s, true)?;
        if negative {
            if magnitude > i64::MIN.unsigned_abs() {
                return Err(Error::range(s, "int64"));
            }
            Ok(Int64(0i64.wrapping_sub_unsigned(magnitude)))
        } else {
            i64::try_from(magnitude)
                .map(Int64)
                .map_err(|_| Error::range(s, "int64"))
        }
    }
}

impl FromStr for UInt64 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (_, magnitude) = parse_decimal(s, false)?;
        Ok(UInt64(magnitude))
    }
}

/// Parses `-?[0-9]+`, rejecting signs, whitespace and trailing characters that `strtoll`
/// would tolerate.
fn parse_decimal(s: &str, signed: bool) -> Result<(bool, u64), Error> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_integer(s));
    }
    if negative && !signed {
        return Err(Error::range(s, "uint64"));
    }

    let mut magnitude: u64 = 0;
    for digit in digits.bytes() {
        magnitude = magnitude
            .checked_mul(10)
            .and_then(|m| m.checked_add(u64::from(digit - b'0')))
            .ok_or_else(|| Error::range(s, if signed { "int64" } else { "uint64" }))?;
    }
    Ok((negative, magnitude))
}

impl fmt::Display for Int64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for UInt64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
