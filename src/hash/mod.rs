//! # Curry & Tree-Hash Engine
//!
//! Content-addressed program identity.
//!
//! - [`tree_hash`] hashes atoms as `sha256(0x01 ∥ bytes)` and pairs as
//!   `sha256(0x02 ∥ H(first) ∥ H(rest))`.
//! - [`curry`] wraps a program as `(a (q . P) (c (q . v1) (c (q . v2) 1)))`.
//! - [`curry_tree_hash`] yields the hash of that wrapper from `H(P)` and the
//!   `H(vi)` alone, without building it.

mod curry;
mod tree;

pub use curry::{curry, curry_tree_hash, curried_values_tree_hash, uncurry};
pub use tree::{hash_atom, hash_pair, tree_hash};

use crate::error::{Error, Result};
use crate::ir::Node;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    /// All-zero value
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    /// Wrap raw digest bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Bytes32(bytes)
    }

    /// Borrow the digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy out of a slice that must be exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| Error::InvalidValue {
            expected: "32 bytes".to_string(),
            got: format!("{} bytes", bytes.len()),
        })?;
        Ok(Bytes32(array))
    }

    /// Bytes atom holding this digest
    pub fn to_node(&self) -> Node {
        Node::bytes(self.0.to_vec())
    }

    /// Flip one bit (bit 0 is the most significant bit of byte 0)
    pub fn with_bit_flipped(&self, bit: usize) -> Self {
        let mut bytes = self.0;
        bytes[(bit / 8) % 32] ^= 0x80 >> (bit % 8);
        Bytes32(bytes)
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Bytes32(bytes)
    }
}

impl AsRef<[u8]> for Bytes32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Bytes32({})", self)
    }
}

impl FromStr for Bytes32 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| Error::InvalidValue {
            expected: "32-byte hex string".to_string(),
            got: format!("{} ({})", s, e),
        })?;
        Bytes32::from_slice(&bytes)
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_display_round_trip() {
        let value = Bytes32([0xab; 32]);
        let text = value.to_string();
        assert!(text.starts_with("0xabab"));
        assert_eq!(text.len(), 66);
        assert_eq!(text.parse::<Bytes32>().unwrap(), value);
        assert_eq!(text[2..].parse::<Bytes32>().unwrap(), value);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert!("0xabcd".parse::<Bytes32>().is_err());
        assert!(Bytes32::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_bit_flip_changes_exactly_one_bit() {
        let flipped = Bytes32::ZERO.with_bit_flipped(9);
        assert_eq!(flipped.0[1], 0x40);
        assert_eq!(flipped.with_bit_flipped(9), Bytes32::ZERO);
    }
}
