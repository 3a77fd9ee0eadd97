//! Identifier sets for secondary indexes
//!
//! Every index key maps to one [`IdSet`]: the set of record identifiers
//! whose records match that key. The set is kept as a strictly ascending
//! array of 64-bit identifiers until it grows past the configured entry
//! limit, at which point it collapses to [`IdSet::Unbounded`] and is no
//! longer tracked precisely.
//!
//! # API
//!
//! - [`IdSet`] - the set itself (insert/remove/union/difference/collapse)
//! - [`codec`] - the on-disk value encoding
//! - [`CodecError`] - corruption errors raised by the decoder

pub mod codec;
mod errors;
mod set;

pub use errors::{CodecError, CodecResult};
pub use set::{IdSet, RecordId};
