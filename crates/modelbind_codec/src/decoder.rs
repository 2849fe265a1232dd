//! Canonical CBOR decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// Trailing bytes after the first complete item are rejected.
///
/// # Errors
///
/// Returns an error if the bytes are not valid canonical CBOR.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::invalid_structure("trailing bytes after value"));
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// Validates that input follows the rules `CanonicalEncoder` produces:
/// shortest integer arguments, sorted map keys, double-width floats and no
/// indefinite-length items.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Maximum nesting of arrays, maps and tags.
const MAX_DEPTH: usize = 128;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.decode_at(0)
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[allow(clippy::cast_possible_wrap)]
    fn decode_at(&mut self, depth: usize) -> CodecResult<Value> {
        if depth > MAX_DEPTH {
            return Err(CodecError::invalid_structure("nesting too deep"));
        }
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-n - 1))
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            2 => {
                let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            3 => {
                let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
                let bytes = self.read_bytes(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => {
                let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode_at(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => self.decode_map(additional_info, depth),
            6 => {
                let tag = self.decode_unsigned(additional_info)?;
                let inner = self.decode_at(depth + 1)?;
                Ok(Value::Tag(tag, Box::new(inner)))
            }
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let value = u16::from_be_bytes(self.read_array()?);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let value = u32::from_be_bytes(self.read_array()?);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let value = u64::from_be_bytes(self.read_array()?);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn decode_length(&mut self, additional_info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        Ok(claimed as usize)
    }

    fn decode_map(&mut self, additional_info: u8, depth: usize) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut pairs = Vec::with_capacity(len.min(1024));
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let key = self.decode_at(depth + 1)?;
            let key_bytes = &self.data[key_start..self.pos];

            // Keys must be strictly increasing.
            if let Some(prev) = prev_key {
                if compare_cbor_bytes(prev, key_bytes) != std::cmp::Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not in sorted order",
                    ));
                }
            }
            prev_key = Some(key_bytes);

            let value = self.decode_at(depth + 1)?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 | 23 => Ok(Value::Null),
            24 => {
                let simple = self.read_byte()?;
                Err(CodecError::unsupported_type(format!("simple value {simple}")))
            }
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must use double precision",
            )),
            27 => {
                let f = f64::from_be_bytes(self.read_array()?);
                if f.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(f))
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Compare two CBOR byte sequences for canonical ordering.
fn compare_cbor_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x18, 255]).unwrap(), Value::Integer(255));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x20]).unwrap(), Value::Integer(-1));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_text_and_bytes() {
        assert_eq!(
            from_cbor(&[0x65, b'h', b'e', b'l', b'l', b'o']).unwrap(),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            from_cbor(&[0x43, 1, 2, 3]).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn decode_double() {
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&2.25f64.to_be_bytes());
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Float(2.25));
    }

    #[test]
    fn reject_narrow_floats() {
        assert!(matches!(
            from_cbor(&[0xf9, 0x00, 0x00]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0xfa, 0x00, 0x00, 0x00, 0x00]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_nan() {
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&f64::NAN.to_be_bytes());
        assert_eq!(from_cbor(&bytes), Err(CodecError::NaNForbidden));
    }

    #[test]
    fn decode_tag_preserved() {
        assert_eq!(
            from_cbor(&[0xc0, 0x61, b'x']).unwrap(),
            Value::tagged(0, Value::Text("x".into()))
        );
    }

    #[test]
    fn reject_indefinite_length() {
        assert!(matches!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
        assert!(matches!(
            from_cbor(&[0xbf, 0x61, b'a', 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
    }

    #[test]
    fn reject_non_shortest_encoding() {
        assert!(matches!(
            from_cbor(&[0x18, 23]),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_cbor(&[0x19, 0x00, 0xff]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_unsorted_map_keys() {
        assert!(matches!(
            from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert!(matches!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_oversized_length() {
        // byte string claiming 2^32 bytes
        assert!(matches!(
            from_cbor(&[0x5b, 0, 0, 0, 1, 0, 0, 0, 0]),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn unexpected_eof() {
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x19, 0x01]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert_eq!(from_cbor(&[0x62, 0xff, 0xfe]), Err(CodecError::InvalidUtf8));
    }
}
