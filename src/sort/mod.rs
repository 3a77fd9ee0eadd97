//! Ordered search results
//!
//! Server-side sorting and virtual-list-view paging: a composite
//! multi-attribute comparator over encoded sort keys, and the windowing
//! algorithm that serves offset- or assertion-addressed pages of a
//! sorted candidate list.
//!
//! # API
//!
//! - [`SortKey`] / [`encode_len`] / [`decode_len`] - composite key codec
//! - [`SortOrder`] / [`SortClause`] / [`ValueComparator`] - comparison
//! - [`OrderedResults`] - per-request candidate ordering and windowing
//! - [`Window`] - one extracted page with response metadata

mod comparator;
mod errors;
mod key;
mod vlv;

pub use comparator::{OctetComparator, SortClause, SortOrder, ValueComparator};
pub use errors::{SortError, SortResult};
pub use key::{decode_len, encode_len, SortKey};
pub use vlv::{
    CancelFlag, CandidateCheck, OrderedResults, RecordSource, RecordUnreadable, SortValueSource,
    Window,
};
