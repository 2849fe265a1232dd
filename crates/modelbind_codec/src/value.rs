//! Dynamic document value type.

use std::cmp::Ordering;

/// A dynamic document value.
///
/// This is the encoding-level representation of a model object. Property
/// values are lowered into it before encoding and lifted out of it after
/// decoding. Floats are carried as `f64`; NaN is rejected by the encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs (keys are sorted for canonical encoding).
    Map(Vec<(Value, Value)>),
    /// Tagged value (CBOR major type 6).
    Tag(u64, Box<Value>),
}

impl Value {
    /// Create a map value with sorted keys.
    ///
    /// Keys are sorted by their canonical CBOR encoding (bytewise comparison).
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Create a map value keyed by text.
    pub fn text_map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::map(
            pairs
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v))
                .collect(),
        )
    }

    /// Create a tagged value.
    pub fn tagged(tag: u64, inner: Value) -> Self {
        Value::Tag(tag, Box::new(inner))
    }

    /// Compare two values for canonical ordering.
    ///
    /// This mirrors the bytewise comparison of canonical CBOR encodings,
    /// which is required for map key sorting.
    #[allow(clippy::match_same_arms)]
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let self_type = self.major_type();
        let other_type = other.major_type();

        if self_type != other_type {
            return self_type.cmp(&other_type);
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => {
                // Positive and negative integers have distinct major types,
                // so both sides share a sign here.
                #[allow(clippy::cast_sign_loss)]
                if *a >= 0 {
                    Self::cmp_unsigned_canonical(*a as u64, *b as u64)
                } else {
                    let arg_a = (-1 - *a) as u64;
                    let arg_b = (-1 - *b) as u64;
                    Self::cmp_unsigned_canonical(arg_a, arg_b)
                }
            }
            (Value::Bytes(a), Value::Bytes(b)) => cmp_length_first(a, b),
            (Value::Text(a), Value::Text(b)) => cmp_length_first(a.as_bytes(), b.as_bytes()),
            (Value::Array(a), Value::Array(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => a
                    .iter()
                    .zip(b.iter())
                    .map(|(av, bv)| av.cmp_canonical(bv))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal),
                ord => ord,
            },
            (Value::Map(a), Value::Map(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => {
                    for ((ak, av), (bk, bv)) in a.iter().zip(b.iter()) {
                        let key_ord = ak.cmp_canonical(bk);
                        if key_ord != Ordering::Equal {
                            return key_ord;
                        }
                        let val_ord = av.cmp_canonical(bv);
                        if val_ord != Ordering::Equal {
                            return val_ord;
                        }
                    }
                    Ordering::Equal
                }
                ord => ord,
            },
            (Value::Tag(ta, a), Value::Tag(tb, b)) => {
                match Self::cmp_unsigned_canonical(*ta, *tb) {
                    Ordering::Equal => a.cmp_canonical(b),
                    ord => ord,
                }
            }
            // Major type 7: simple values encode in one byte, floats in nine.
            _ => self.simple_rank().cmp(&other.simple_rank()).then_with(|| {
                match (self, other) {
                    (Value::Float(a), Value::Float(b)) => a.to_bits().to_be_bytes().cmp(&b.to_bits().to_be_bytes()),
                    _ => Ordering::Equal,
                }
            }),
        }
    }

    /// Compare two unsigned integers by their canonical CBOR encoding.
    fn cmp_unsigned_canonical(a: u64, b: u64) -> Ordering {
        match Self::cbor_uint_encoded_len(a).cmp(&Self::cbor_uint_encoded_len(b)) {
            Ordering::Equal => a.cmp(&b),
            ord => ord,
        }
    }

    /// Returns the encoded length (in bytes) of an unsigned integer in CBOR.
    fn cbor_uint_encoded_len(n: u64) -> usize {
        if n <= 23 {
            1
        } else if n <= 0xFF {
            2
        } else if n <= 0xFFFF {
            3
        } else if n <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Get the CBOR major type for this value.
    fn major_type(&self) -> u8 {
        match self {
            Value::Integer(n) if *n >= 0 => 0,
            Value::Integer(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Tag(..) => 6,
            Value::Bool(_) | Value::Null | Value::Float(_) => 7,
        }
    }

    /// Ordering of major type 7 values by their encoded bytes.
    fn simple_rank(&self) -> u8 {
        match self {
            Value::Bool(false) => 0,
            Value::Bool(true) => 1,
            Value::Null => 2,
            Value::Float(_) => 3,
            _ => 4,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    ///
    /// Integers are not widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get the tag number and inner value, if this value is tagged.
    pub fn as_tag(&self) -> Option<(u64, &Value)> {
        match self {
            Value::Tag(tag, inner) => Some((*tag, inner)),
            _ => None,
        }
    }

    /// Look up a key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

fn cmp_length_first(a: &[u8], b: &[u8]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        ord => ord,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keys_are_sorted() {
        let map = Value::text_map([
            ("z", Value::Integer(1)),
            ("a", Value::Integer(2)),
            ("m", Value::Integer(3)),
        ]);

        let pairs = map.as_map().unwrap();
        assert_eq!(pairs[0].0, Value::Text("a".to_string()));
        assert_eq!(pairs[1].0, Value::Text("m".to_string()));
        assert_eq!(pairs[2].0, Value::Text("z".to_string()));
    }

    #[test]
    fn map_key_length_ordering() {
        // Shorter keys come first in canonical CBOR
        let map = Value::text_map([
            ("abc", Value::Integer(1)),
            ("a", Value::Integer(2)),
            ("ab", Value::Integer(3)),
        ]);

        let keys: Vec<_> = map
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn integer_ordering() {
        let mut sorted = vec![
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(-2),
            Value::Integer(2),
        ];
        sorted.sort_by(Value::cmp_canonical);

        assert_eq!(
            sorted,
            vec![
                Value::Integer(0),
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(-1),
                Value::Integer(-2),
            ]
        );
    }

    #[test]
    fn simple_values_sort_before_floats() {
        let mut sorted = vec![
            Value::Float(0.5),
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
        ];
        sorted.sort_by(Value::cmp_canonical);

        assert_eq!(sorted[0], Value::Bool(false));
        assert_eq!(sorted[1], Value::Bool(true));
        assert_eq!(sorted[2], Value::Null);
        assert_eq!(sorted[3], Value::Float(0.5));
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Integer(42).as_float(), None);
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::Text("hello".to_string()).as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));

        let tagged = Value::tagged(37, Value::Bytes(vec![0; 16]));
        let (tag, inner) = tagged.as_tag().unwrap();
        assert_eq!(tag, 37);
        assert_eq!(inner.as_bytes().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn map_get() {
        let map = Value::text_map([
            ("name", Value::Text("Alice".to_string())),
            ("age", Value::Integer(30)),
        ]);

        assert_eq!(map.get("name"), Some(&Value::Text("Alice".to_string())));
        assert_eq!(map.get("age"), Some(&Value::Integer(30)));
        assert_eq!(map.get("missing"), None);
    }
}
