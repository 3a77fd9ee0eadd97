//! Composite sort key encoding
//!
//! An encoded key is the concatenation of length-prefixed normalized
//! field values (one per ordering clause) followed by an 8-byte
//! big-endian record identifier:
//!
//! ```text
//! | len | value | len | value | ... | 8-byte record id |
//! ```
//!
//! A length below 128 is a single byte. Longer values use a tag byte
//! whose low bits give the count of big-endian length bytes that
//! follow. A zero-length value marks an absent (null) field. A
//! zero-length whole key is the reserved "maximum" sentinel: it sorts
//! after every other key.
//!
//! Assertion values for by-assertion paging encode as partial keys:
//! fewer fields than the sort order has clauses, and no trailing id.

use crate::idset::RecordId;

use super::errors::{SortError, SortResult};

/// Tag bit marking a multi-byte length.
const LONG_LENGTH_TAG: u8 = 0x80;

/// Appends the short/long encoding of `len` to `out`.
pub fn encode_len(out: &mut Vec<u8>, len: usize) {
    if len < 128 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(LONG_LENGTH_TAG | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Decodes one length at `*pos`, advancing `*pos` past it.
pub fn decode_len(bytes: &[u8], pos: &mut usize) -> SortResult<usize> {
    let tag = *bytes
        .get(*pos)
        .ok_or_else(|| SortError::CorruptKey("truncated length tag".into()))?;
    *pos += 1;
    if tag & LONG_LENGTH_TAG == 0 {
        return Ok(tag as usize);
    }

    let count = (tag & !LONG_LENGTH_TAG) as usize;
    if count == 0 || count > 8 {
        return Err(SortError::CorruptKey(format!(
            "invalid length tag {:#04x}",
            tag
        )));
    }
    let end = *pos + count;
    if end > bytes.len() {
        return Err(SortError::CorruptKey("truncated multi-byte length".into()));
    }
    let mut len: usize = 0;
    for b in &bytes[*pos..end] {
        len = (len << 8) | *b as usize;
    }
    *pos = end;
    Ok(len)
}

/// A composite sort key: per-clause normalized values plus the owning
/// record identifier.
///
/// Built transiently while assembling one search response; never
/// persisted. `None` fields are absent (null) values, which sort after
/// every non-null value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    fields: Vec<Option<Vec<u8>>>,
    id: Option<RecordId>,
}

impl SortKey {
    /// Builds a key from per-clause values and an owning record id.
    pub fn new(fields: Vec<Option<Vec<u8>>>, id: Option<RecordId>) -> Self {
        Self { fields, id }
    }

    /// The reserved "maximum" sentinel key.
    pub fn max() -> Self {
        Self {
            fields: Vec::new(),
            id: None,
        }
    }

    /// Returns whether this is the maximum sentinel.
    pub fn is_max(&self) -> bool {
        self.fields.is_empty() && self.id.is_none()
    }

    /// Per-clause values. Shorter than the sort order for partial keys.
    pub fn fields(&self) -> &[Option<Vec<u8>>] {
        &self.fields
    }

    /// The value for clause `index`, or `None` past the end of a
    /// partial key.
    pub fn field(&self, index: usize) -> Option<Option<&[u8]>> {
        self.fields.get(index).map(|f| f.as_deref())
    }

    /// The trailing record identifier, absent on partial keys.
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Encodes the key. The sentinel encodes as zero bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            match field {
                Some(value) => {
                    encode_len(&mut out, value.len());
                    out.extend_from_slice(value);
                }
                None => encode_len(&mut out, 0),
            }
        }
        if let Some(id) = self.id {
            out.extend_from_slice(&id.to_be_bytes());
        }
        out
    }

    /// Decodes a key carrying up to `clause_count` fields.
    ///
    /// Zero bytes decode as the sentinel. Fewer fields than
    /// `clause_count` (and no trailing id) decode as a partial key.
    /// Exactly 8 bytes after the fields are the record id; any other
    /// remainder is corrupt.
    pub fn decode(bytes: &[u8], clause_count: usize) -> SortResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::max());
        }
        let mut pos = 0;
        let mut fields = Vec::with_capacity(clause_count);
        while fields.len() < clause_count && pos < bytes.len() {
            let len = decode_len(bytes, &mut pos)?;
            if len == 0 {
                fields.push(None);
                continue;
            }
            let end = pos + len;
            if end > bytes.len() {
                return Err(SortError::CorruptKey(format!(
                    "field length {} overruns key ({} bytes left)",
                    len,
                    bytes.len() - pos
                )));
            }
            fields.push(Some(bytes[pos..end].to_vec()));
            pos = end;
        }

        let id = match bytes.len() - pos {
            0 => None,
            8 => {
                let mut id_bytes = [0u8; 8];
                id_bytes.copy_from_slice(&bytes[pos..]);
                Some(RecordId::from_be_bytes(id_bytes))
            }
            trailing => {
                return Err(SortError::CorruptKey(format!(
                    "{} trailing bytes after {} fields",
                    trailing,
                    fields.len()
                )))
            }
        };
        Ok(Self { fields, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_length_single_byte() {
        let mut out = Vec::new();
        encode_len(&mut out, 0);
        encode_len(&mut out, 127);
        assert_eq!(out, vec![0, 127]);
    }

    #[test]
    fn test_long_length_tagged() {
        let mut out = Vec::new();
        encode_len(&mut out, 128);
        assert_eq!(out, vec![0x81, 128]);

        let mut out = Vec::new();
        encode_len(&mut out, 0x1234);
        assert_eq!(out, vec![0x82, 0x12, 0x34]);
    }

    #[test]
    fn test_length_roundtrip() {
        for len in [0usize, 1, 127, 128, 255, 256, 65535, 65536, 1 << 20] {
            let mut out = Vec::new();
            encode_len(&mut out, len);
            let mut pos = 0;
            assert_eq!(decode_len(&out, &mut pos).unwrap(), len);
            assert_eq!(pos, out.len());
        }
    }

    #[test]
    fn test_decode_len_rejects_truncation() {
        assert!(decode_len(&[], &mut 0).is_err());
        assert!(decode_len(&[0x82, 0x12], &mut 0).is_err());
    }

    #[test]
    fn test_key_roundtrip() {
        let key = SortKey::new(
            vec![Some(b"smith".to_vec()), None, Some(b"alice".to_vec())],
            Some(42),
        );
        let encoded = key.encode();
        assert_eq!(SortKey::decode(&encoded, 3).unwrap(), key);
    }

    #[test]
    fn test_sentinel_roundtrip() {
        let sentinel = SortKey::max();
        assert!(sentinel.encode().is_empty());
        let decoded = SortKey::decode(&[], 3).unwrap();
        assert!(decoded.is_max());
    }

    #[test]
    fn test_partial_key_roundtrip() {
        let partial = SortKey::new(vec![Some(b"smith".to_vec())], None);
        let encoded = partial.encode();
        let decoded = SortKey::decode(&encoded, 3).unwrap();
        assert_eq!(decoded.fields().len(), 1);
        assert_eq!(decoded.id(), None);
    }

    #[test]
    fn test_null_field_is_zero_length() {
        let key = SortKey::new(vec![None], Some(1));
        let encoded = key.encode();
        assert_eq!(encoded[0], 0);
        assert_eq!(SortKey::decode(&encoded, 1).unwrap(), key);
    }

    #[test]
    fn test_long_field_roundtrip() {
        let value = vec![7u8; 300];
        let key = SortKey::new(vec![Some(value)], Some(9));
        let encoded = key.encode();
        assert_eq!(SortKey::decode(&encoded, 1).unwrap(), key);
    }

    #[test]
    fn test_decode_rejects_overrun_field() {
        let mut bytes = Vec::new();
        encode_len(&mut bytes, 10);
        bytes.extend_from_slice(b"short");
        assert!(SortKey::decode(&bytes, 1).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_trailing_bytes() {
        let key = SortKey::new(vec![Some(b"v".to_vec())], None);
        let mut encoded = key.encode();
        encoded.extend_from_slice(&[1, 2, 3]);
        assert!(SortKey::decode(&encoded, 1).is_err());
    }
}
