//! # modelbind codec
//!
//! Deterministic CBOR encoding/decoding for model documents.
//!
//! Model objects are lowered into a dynamic [`Value`] tree and encoded
//! with a small set of rules that make the output byte-stable:
//!
//! - Maps are sorted by key (bytewise comparison of encoded keys)
//! - Integers use shortest encoding
//! - Floats always use the 8-byte double form; NaN is rejected
//! - Strings must be UTF-8
//! - No indefinite-length items
//! - Tags (major type 6) are preserved on both sides
//!
//! ## Usage
//!
//! ```
//! use modelbind_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::text_map([("Name", Value::from("abc")), ("Score", Value::Float(1.5))]);
//! let bytes = to_canonical_cbor(&value).unwrap();
//!
//! let decoded: Value = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: &Value) -> Value {
        from_cbor(&to_canonical_cbor(value).unwrap()).unwrap()
    }

    #[test]
    fn roundtrip_nested_document() {
        let value = Value::text_map([
            (
                "Items",
                Value::Array(vec![
                    Value::text_map([("Name", Value::from("a")), ("Qty", Value::Integer(2))]),
                    Value::Null,
                ]),
            ),
            ("Guid", Value::tagged(37, Value::Bytes(vec![7; 16]))),
            ("Ratio", Value::Float(-0.25)),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = Value::Map(vec![
            (Value::from("x"), Value::Integer(1)),
            (Value::from("y"), Value::Integer(2)),
        ]);
        let b = Value::Map(vec![
            (Value::from("y"), Value::Integer(2)),
            (Value::from("x"), Value::Integer(1)),
        ]);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    proptest! {
        #[test]
        fn integers_roundtrip(n in any::<i64>()) {
            prop_assert_eq!(roundtrip(&Value::Integer(n)), Value::Integer(n));
        }

        #[test]
        fn finite_floats_roundtrip(f in any::<f64>().prop_filter("finite", |f| !f.is_nan())) {
            prop_assert_eq!(roundtrip(&Value::Float(f)), Value::Float(f));
        }

        #[test]
        fn text_roundtrips(s in ".{0,64}") {
            prop_assert_eq!(roundtrip(&Value::Text(s.clone())), Value::Text(s));
        }
    }
}
