//! Core identity types.

use std::fmt;
use uuid::Uuid;

/// Row identity of a managed object inside an engine.
///
/// Keys are assigned by the engine, are unique per type and are never
/// reused for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(pub u64);

impl ObjectKey {
    /// Creates a new object key.
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// A 12-byte object identifier value.
///
/// This is a property value kind, unrelated to [`ObjectKey`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Creates an object id from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Creates a new random object id.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&Uuid::new_v4().as_bytes()[..12]);
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Creates an object id from a slice.
    ///
    /// Returns `None` if the slice is not exactly 12 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 12]>::try_from(slice).ok().map(Self)
    }

    /// Parses the 24-character hex form.
    #[must_use]
    pub fn parse_hex(text: &str) -> Option<Self> {
        if text.len() != 24 || !text.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_display() {
        assert_eq!(format!("{}", ObjectKey::new(42)), "obj:42");
    }

    #[test]
    fn object_key_ordering() {
        assert!(ObjectKey::new(1) < ObjectKey::new(2));
    }

    #[test]
    fn object_id_hex_roundtrip() {
        let id = ObjectId::from_bytes([0xab; 12]);
        let text = id.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(ObjectId::parse_hex(&text), Some(id));
    }

    #[test]
    fn object_id_rejects_bad_hex() {
        assert!(ObjectId::parse_hex("zz").is_none());
        assert!(ObjectId::parse_hex(&"g".repeat(24)).is_none());
    }

    #[test]
    fn object_id_from_slice() {
        assert!(ObjectId::from_slice(&[0u8; 12]).is_some());
        assert!(ObjectId::from_slice(&[0u8; 11]).is_none());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }
}
