//! Location descriptors.
//!
//! A [`LocationDescriptor`] names a point in the guest program together with
//! the execution-mode flags in force there. The packing of program counter
//! and flags belongs to the frontend; this crate only compares, prints and
//! encodes the raw 64-bit value.

use std::fmt;

use super::codec::WordReader;
use crate::core::CorruptEntry;

/// Opaque guest location plus execution-mode context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LocationDescriptor(u64);

impl LocationDescriptor {
    /// Number of 16-bit words in the encoded form.
    pub const WORDS: usize = 4;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw packed value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Append the four little-endian words of this location.
    pub fn serialize(self, out: &mut Vec<u16>) {
        let mut work = self.0;
        for _ in 0..Self::WORDS {
            out.push(work as u16);
            work >>= 16;
        }
    }

    /// Reassemble a location from four little-endian words.
    pub fn deserialize(reader: &mut WordReader<'_>) -> Result<Self, CorruptEntry> {
        reader.read_u64().map(Self)
    }
}

impl From<u64> for LocationDescriptor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:016x}}}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_order() {
        let mut out = Vec::new();
        LocationDescriptor::new(0x1122_3344_5566_7788).serialize(&mut out);
        assert_eq!(out, vec![0x7788, 0x5566, 0x3344, 0x1122]);

        let mut reader = WordReader::new(&out);
        let decoded = LocationDescriptor::deserialize(&mut reader).unwrap();
        assert_eq!(decoded.value(), 0x1122_3344_5566_7788);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_truncated() {
        let words = [0x1000, 0x0000, 0x0000];
        let mut reader = WordReader::new(&words);
        assert_eq!(
            LocationDescriptor::deserialize(&mut reader),
            Err(CorruptEntry::UnexpectedEnd(3))
        );
    }

    #[test]
    fn test_ordering_and_display() {
        let a = LocationDescriptor::new(0x1000);
        let b = LocationDescriptor::new(0x1004);
        assert!(a < b);
        assert_eq!(a.to_string(), "{0000000000001000}");
    }
}
