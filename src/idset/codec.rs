//! On-disk encoding for identifier sets
//!
//! The value stored under an index key is one of:
//!
//! ```text
//! +--------------------+-----------------------------------------+
//! | Empty              | zero bytes                              |
//! | Defined (size N)   | N x 8 bytes, big-endian, ascending      |
//! | Unbounded          | single sentinel byte 0xFF               |
//! +--------------------+-----------------------------------------+
//! ```
//!
//! The sentinel length (1) is deliberately not a multiple of 8, so the
//! three cases never overlap. Every other length, and any out-of-order
//! identifier run, is rejected as corruption.

use super::errors::{CodecError, CodecResult};
use super::set::{IdSet, RecordId};

/// Sentinel byte marking an unbounded set.
pub const UNBOUNDED_SENTINEL: u8 = 0xFF;

/// Encodes a set into its on-disk value form.
pub fn encode(set: &IdSet) -> Vec<u8> {
    match set {
        IdSet::Empty => Vec::new(),
        IdSet::Defined(ids) => {
            let mut buf = Vec::with_capacity(ids.len() * 8);
            for id in ids {
                buf.extend_from_slice(&id.to_be_bytes());
            }
            buf
        }
        IdSet::Unbounded => vec![UNBOUNDED_SENTINEL],
    }
}

/// Decodes an on-disk value back into a set.
///
/// Fails with a corruption error on any length that is neither zero, the
/// sentinel, nor a multiple of 8, and on identifier runs that are not
/// strictly ascending.
pub fn decode(bytes: &[u8]) -> CodecResult<IdSet> {
    if bytes.is_empty() {
        return Ok(IdSet::Empty);
    }
    if bytes.len() == 1 {
        if bytes[0] == UNBOUNDED_SENTINEL {
            return Ok(IdSet::Unbounded);
        }
        return Err(CodecError::InvalidSentinel(bytes[0]));
    }
    if bytes.len() % 8 != 0 {
        return Err(CodecError::InvalidLength(bytes.len()));
    }

    let mut ids = Vec::with_capacity(bytes.len() / 8);
    for (index, chunk) in bytes.chunks_exact(8).enumerate() {
        let id = RecordId::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        if let Some(&last) = ids.last() {
            if id <= last {
                return Err(CodecError::UnsortedIds(index));
            }
        }
        ids.push(id);
    }
    Ok(IdSet::Defined(ids))
}
