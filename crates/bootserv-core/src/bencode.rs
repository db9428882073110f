//! # Bencode
//!
//! Minimal, strict bencode reader and writer for router contacts.
//!
//! The reader only accepts the canonical form: integers without leading
//! zeros or negative zero, string lengths without leading zeros, dictionary
//! keys in strictly ascending byte order, and no trailing bytes. Two
//! encodings of the same record therefore always compare equal, which is
//! what makes "zero the signature bytes in place" a sound signing rule.

use std::ops::Range;

use crate::error::BencodeError;

/// Maximum nesting depth accepted by the decoder.
const MAX_DEPTH: usize = 16;

/// A decoded bencode value borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    /// `i<digits>e`
    Integer(i64),
    /// `<len>:<bytes>`
    Bytes(&'a [u8]),
    /// `l<values>e`
    List(Vec<Value<'a>>),
    /// `d<key><value>...e`
    Dict(Vec<Entry<'a>>),
}

/// One dictionary entry together with the byte range its value occupies
/// in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub value: Value<'a>,
    pub span: Range<usize>,
}

impl<'a> Value<'a> {
    /// Look up a key in a dictionary value.
    pub fn get(&self, key: &[u8]) -> Option<&Entry<'a>> {
        match self {
            Value::Dict(entries) => entries.iter().find(|e| e.key == key),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Decode a complete buffer. Trailing bytes are an error.
pub fn decode(input: &[u8]) -> Result<Value<'_>, BencodeError> {
    let mut decoder = Decoder { input, pos: 0 };
    let value = decoder.value(0)?;
    if decoder.pos != input.len() {
        return Err(decoder.error("trailing bytes after value"));
    }
    Ok(value)
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn error(&self, reason: &str) -> BencodeError {
        BencodeError {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of input"))
    }

    fn value(&mut self, depth: usize) -> Result<Value<'a>, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                let n = self.number(b'e')?;
                Ok(Value::Integer(n))
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut entries: Vec<Entry<'a>> = Vec::new();
                while self.peek()? != b'e' {
                    let key_offset = self.pos;
                    let key = self.bytes()?;
                    if let Some(prev) = entries.last() {
                        if prev.key >= key {
                            return Err(BencodeError {
                                offset: key_offset,
                                reason: "dictionary keys not in ascending order".to_string(),
                            });
                        }
                    }
                    let start = self.pos;
                    let value = self.value(depth + 1)?;
                    entries.push(Entry {
                        key,
                        value,
                        span: start..self.pos,
                    });
                }
                self.pos += 1;
                Ok(Value::Dict(entries))
            }
            b'0'..=b'9' => Ok(Value::Bytes(self.bytes()?)),
            _ => Err(self.error("unexpected byte")),
        }
    }

    fn bytes(&mut self) -> Result<&'a [u8], BencodeError> {
        let len = self.number(b':')?;
        if len < 0 {
            return Err(self.error("negative string length"));
        }
        let len = len as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("string runs past end of input"))?;
        let out = &self.input[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Read a canonical decimal integer terminated by `terminator`.
    fn number(&mut self, terminator: u8) -> Result<i64, BencodeError> {
        let start = self.pos;
        let end = self.input[start..]
            .iter()
            .position(|b| *b == terminator)
            .map(|i| start + i)
            .ok_or_else(|| self.error("unterminated integer"))?;
        let digits = &self.input[start..end];
        let (negative, magnitude) = match digits.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, digits),
        };
        let canonical = !magnitude.is_empty()
            && magnitude.iter().all(u8::is_ascii_digit)
            && (magnitude.len() == 1 || magnitude[0] != b'0')
            && !(negative && magnitude == b"0");
        if !canonical {
            return Err(self.error("non-canonical integer"));
        }
        let text = std::str::from_utf8(digits).map_err(|_| self.error("non-canonical integer"))?;
        let n = text
            .parse::<i64>()
            .map_err(|_| self.error("integer out of range"))?;
        self.pos = end + 1;
        Ok(n)
    }
}

/// Append a byte string.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Append an integer.
pub fn write_integer(out: &mut Vec<u8>, n: i64) {
    out.push(b'i');
    out.extend_from_slice(n.to_string().as_bytes());
    out.push(b'e');
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_nested_dictionary() {
        let v = decode(b"d1:ali1ei2ee1:k3:abce").unwrap();
        let a = v.get(b"a").unwrap();
        assert_eq!(
            a.value,
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
        let k = v.get(b"k").unwrap();
        assert_eq!(k.value.as_bytes(), Some(&b"abc"[..]));
        assert_eq!(k.span, 15..20);
    }

    #[test]
    fn rejects_unsorted_keys() {
        let err = decode(b"d1:bi1e1:ai2ee").unwrap_err();
        assert!(err.reason.contains("ascending"));
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert!(decode(b"d1:ai1e1:ai2ee").is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let err = decode(b"i1ei2e").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn rejects_non_canonical_integers() {
        assert!(decode(b"i01e").is_err());
        assert!(decode(b"i-0e").is_err());
        assert!(decode(b"ie").is_err());
        assert!(decode(b"i-e").is_err());
        assert_eq!(decode(b"i-42e").unwrap(), Value::Integer(-42));
        assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
    }

    #[test]
    fn rejects_truncated_string() {
        assert!(decode(b"10:abc").is_err());
        assert!(decode(b"03:abc").is_err());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut deep = vec![b'l'; MAX_DEPTH + 2];
        deep.extend(std::iter::repeat(b'e').take(MAX_DEPTH + 2));
        let err = decode(&deep).unwrap_err();
        assert!(err.reason.contains("deep"));
    }

    #[test]
    fn writer_output_decodes() {
        let mut out = vec![b'd'];
        write_bytes(&mut out, b"u");
        write_integer(&mut out, 1_700_000_000_000);
        write_bytes(&mut out, b"v");
        write_integer(&mut out, 0);
        out.push(b'e');
        let v = decode(&out).unwrap();
        assert_eq!(
            v.get(b"u").and_then(|e| e.value.as_integer()),
            Some(1_700_000_000_000)
        );
    }

    proptest! {
        #[test]
        fn decoder_never_panics(input in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&input);
        }

        #[test]
        fn integers_decode_to_themselves(n in any::<i64>()) {
            let mut out = Vec::new();
            write_integer(&mut out, n);
            prop_assert_eq!(decode(&out).unwrap(), Value::Integer(n));
        }
    }
}
