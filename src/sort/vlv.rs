//! Virtual-list-view result windowing
//!
//! Given a candidate identifier set already produced by the query
//! planner, [`OrderedResults::collect`] fetches each record, drops
//! candidates that fail the scope or filter check (or cannot be read),
//! and orders the survivors under a [`SortOrder`]. The two windowing
//! modes then extract a bounded page of the ordered list, addressed
//! either by numeric offset or by a value assertion.
//!
//! Unreadable records are counted and skipped, never fatal: a search
//! response with a few unreadable candidates is still a response.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use thiserror::Error;

use crate::idset::RecordId;

use super::comparator::SortOrder;
use super::errors::{SortError, SortResult};
use super::key::SortKey;

/// Why one candidate's record could not be produced.
#[derive(Debug, Clone, Error)]
#[error("record {id} unreadable: {reason}")]
pub struct RecordUnreadable {
    /// The candidate identifier
    pub id: RecordId,
    /// Decode or fetch failure detail
    pub reason: String,
}

/// The record store collaborator: resolves an identifier to a record.
pub trait RecordSource<R> {
    /// Fetches the record for `id`, `None` if it no longer exists.
    fn fetch(&mut self, id: RecordId) -> Result<Option<R>, RecordUnreadable>;
}

/// Scope and filter verification, already bound to one search request.
pub trait CandidateCheck<R> {
    /// Whether the record lies within the search base and scope.
    fn in_scope(&self, record: &R) -> bool;

    /// Whether the record matches the search filter.
    fn filter_matches(&self, record: &R) -> bool;
}

/// Produces the normalized per-clause sort values for a record.
pub trait SortValueSource<R> {
    /// One value per ordering clause; `None` for an absent attribute.
    fn sort_values(&self, record: &R) -> Vec<Option<Vec<u8>>>;
}

/// Cooperative cancellation flag for one windowing request.
///
/// Checked once per candidate between record fetches; a fetch already
/// in flight is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// One extracted result window plus its response metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// The windowed identifiers, in sort order
    pub ids: Vec<RecordId>,
    /// Total size of the ordered candidate list
    pub content_count: usize,
    /// 1-based position of the target entry (`size + 1` when the
    /// target lies past the end of the list)
    pub target_offset: usize,
}

/// The ordered candidate list for one search response.
pub struct OrderedResults<'a> {
    order: &'a SortOrder,
    entries: Vec<(SortKey, RecordId)>,
    skipped: usize,
}

impl std::fmt::Debug for OrderedResults<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedResults")
            .field("clause_count", &self.order.clause_count())
            .field("len", &self.entries.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl<'a> OrderedResults<'a> {
    /// Fetches, verifies and orders `candidates`.
    ///
    /// Candidates whose fetch fails, whose record is gone, or which
    /// fail the scope or filter check are counted in [`skipped`] and
    /// dropped. Ties between equal sort values resolve by ascending
    /// record id (the keys carry their ids).
    ///
    /// [`skipped`]: OrderedResults::skipped
    pub fn collect<R>(
        order: &'a SortOrder,
        candidates: impl IntoIterator<Item = RecordId>,
        source: &mut impl RecordSource<R>,
        check: &impl CandidateCheck<R>,
        values: &impl SortValueSource<R>,
        cancel: &CancelFlag,
    ) -> SortResult<Self> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for id in candidates {
            if cancel.is_cancelled() {
                return Err(SortError::Cancelled);
            }
            let record = match source.fetch(id) {
                Ok(Some(record)) => record,
                Ok(None) | Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if !check.in_scope(&record) || !check.filter_matches(&record) {
                skipped += 1;
                continue;
            }
            entries.push((SortKey::new(values.sort_values(&record), Some(id)), id));
        }
        entries.sort_by(|(a, _), (b, _)| order.compare(a, b));
        Ok(Self {
            order,
            entries,
            skipped,
        })
    }

    /// Size of the ordered list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the ordered list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates dropped during collection.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The full ordered identifier list.
    pub fn ids(&self) -> Vec<RecordId> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }

    /// Extracts a window addressed by a 1-based numeric offset.
    ///
    /// A negative offset is an error. Offset 0 is treated as 1 (a
    /// defined compatibility fallback, the only silent coercion). A
    /// window reaching before the list head is clamped to it; a target
    /// past the end is redefined as `size + 1` and returns only the
    /// trailing `before_count` entries.
    pub fn window_by_offset(
        &self,
        target_offset: i64,
        before_count: usize,
        after_count: usize,
    ) -> SortResult<Window> {
        if target_offset < 0 {
            return Err(SortError::InvalidRequest(format!(
                "negative target offset {}",
                target_offset
            )));
        }
        let size = self.entries.len();
        let mut target = if target_offset == 0 {
            1
        } else {
            target_offset as usize
        };
        let mut before = before_count;
        let mut after = after_count;

        let mut list_offset = target - 1;
        let start_pos = if list_offset < before {
            // The window reaches before the list head; shrink it so it
            // starts exactly at the head.
            before = list_offset;
            0
        } else if list_offset - before >= size {
            // The start lies past the end: the target becomes one past
            // the last entry and nothing follows it.
            target = size + 1;
            list_offset = size;
            before = before.min(list_offset);
            after = 0;
            list_offset - before
        } else {
            list_offset - before
        };

        let want = 1 + before + after;
        let end = (start_pos + want).min(size);
        let ids = self.entries[start_pos.min(size)..end]
            .iter()
            .map(|(_, id)| *id)
            .collect();
        Ok(Window {
            ids,
            content_count: size,
            target_offset: target,
        })
    }

    /// Extracts a window around the first entry whose key is greater
    /// than or equal to `assertion` (compared as a partial key on the
    /// first clause).
    ///
    /// The window holds up to `before_count` entries preceding the
    /// match, the match itself, and up to `after_count` entries after
    /// it. With no matching entry the window is empty and the target
    /// offset is `size + 1`.
    pub fn window_by_assertion(
        &self,
        assertion: &[u8],
        before_count: usize,
        after_count: usize,
    ) -> SortResult<Window> {
        let size = self.entries.len();
        let target_key = SortKey::new(vec![Some(assertion.to_vec())], None);

        let matched = self.entries.iter().position(|(key, _)| {
            self.order.compare(key, &target_key) != std::cmp::Ordering::Less
        });
        let Some(index) = matched else {
            return Ok(Window {
                ids: Vec::new(),
                content_count: size,
                target_offset: size + 1,
            });
        };

        let start = index - before_count.min(index);
        let end = (index + 1 + after_count).min(size);
        Ok(Window {
            ids: self.entries[start..end].iter().map(|(_, id)| *id).collect(),
            content_count: size,
            target_offset: index + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::comparator::{OctetComparator, SortClause};
    use std::collections::HashMap;

    /// Test record: a single sortable name, a scope flag and a filter flag.
    #[derive(Clone)]
    struct Rec {
        name: Option<&'static str>,
        in_scope: bool,
        matches: bool,
    }

    struct MapSource {
        records: HashMap<RecordId, Rec>,
        unreadable: Vec<RecordId>,
        fetches: usize,
    }

    impl RecordSource<Rec> for MapSource {
        fn fetch(&mut self, id: RecordId) -> Result<Option<Rec>, RecordUnreadable> {
            self.fetches += 1;
            if self.unreadable.contains(&id) {
                return Err(RecordUnreadable {
                    id,
                    reason: "decode failed".into(),
                });
            }
            Ok(self.records.get(&id).cloned())
        }
    }

    struct Checks;

    impl CandidateCheck<Rec> for Checks {
        fn in_scope(&self, record: &Rec) -> bool {
            record.in_scope
        }

        fn filter_matches(&self, record: &Rec) -> bool {
            record.matches
        }
    }

    struct NameValues;

    impl SortValueSource<Rec> for NameValues {
        fn sort_values(&self, record: &Rec) -> Vec<Option<Vec<u8>>> {
            vec![record.name.map(|n| n.as_bytes().to_vec())]
        }
    }

    fn order() -> SortOrder {
        SortOrder::new(vec![SortClause::ascending(Box::new(OctetComparator))])
    }

    fn source(names: &[(RecordId, &'static str)]) -> MapSource {
        let records = names
            .iter()
            .map(|(id, name)| {
                (
                    *id,
                    Rec {
                        name: Some(name),
                        in_scope: true,
                        matches: true,
                    },
                )
            })
            .collect();
        MapSource {
            records,
            unreadable: Vec::new(),
            fetches: 0,
        }
    }

    fn collect<'a>(order: &'a SortOrder, source: &mut MapSource, ids: &[RecordId]) -> OrderedResults<'a> {
        OrderedResults::collect(
            order,
            ids.iter().copied(),
            source,
            &Checks,
            &NameValues,
            &CancelFlag::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_collect_orders_by_value_then_id() {
        let order = order();
        let mut source = source(&[(1, "carol"), (2, "alice"), (3, "alice")]);
        let results = collect(&order, &mut source, &[1, 2, 3]);
        assert_eq!(results.ids(), vec![2, 3, 1]);
    }

    #[test]
    fn test_collect_skips_failures() {
        let order = order();
        let mut source = source(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        source.unreadable.push(2);
        source.records.get_mut(&3).unwrap().in_scope = false;
        source.records.get_mut(&4).unwrap().matches = false;

        let results = collect(&order, &mut source, &[1, 2, 3, 4, 99]);
        assert_eq!(results.ids(), vec![1]);
        // Unreadable, out-of-scope, non-matching and absent all count.
        assert_eq!(results.skipped(), 4);
        // One fetch per candidate, skipped or not.
        assert_eq!(source.fetches, 5);
    }

    #[test]
    fn test_collect_cancellation() {
        let order = order();
        let mut source = source(&[(1, "a")]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = OrderedResults::collect(
            &order,
            [1u64],
            &mut source,
            &Checks,
            &NameValues,
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err, SortError::Cancelled);
    }

    fn ten<'a>(order: &'a SortOrder, source: &mut MapSource) -> OrderedResults<'a> {
        OrderedResults::collect(
            order,
            1..=10,
            source,
            &Checks,
            &NameValues,
            &CancelFlag::new(),
        )
        .unwrap()
    }

    fn source_ten() -> MapSource {
        // Names sort in id order: n00 < n01 < ...
        let records = (1..=10)
            .map(|id| {
                (
                    id,
                    Rec {
                        name: Some(Box::leak(format!("n{:02}", id).into_boxed_str())),
                        in_scope: true,
                        matches: true,
                    },
                )
            })
            .collect();
        MapSource {
            records,
            unreadable: Vec::new(),
            fetches: 0,
        }
    }

    #[test]
    fn test_offset_window_clamps_at_head() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_offset(1, 5, 0).unwrap();
        assert_eq!(window.ids, vec![1]);
        assert_eq!(window.content_count, 10);
        assert_eq!(window.target_offset, 1);
    }

    #[test]
    fn test_offset_window_past_end() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_offset(15, 3, 4).unwrap();
        assert_eq!(window.ids, vec![8, 9, 10]);
        assert_eq!(window.target_offset, 11);
        assert_eq!(window.content_count, 10);
    }

    #[test]
    fn test_offset_window_middle() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_offset(5, 1, 2).unwrap();
        assert_eq!(window.ids, vec![4, 5, 6, 7]);
        assert_eq!(window.target_offset, 5);
    }

    #[test]
    fn test_offset_zero_means_one() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_offset(0, 0, 1).unwrap();
        assert_eq!(window.ids, vec![1, 2]);
        assert_eq!(window.target_offset, 1);
    }

    #[test]
    fn test_negative_offset_rejected() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        assert!(matches!(
            results.window_by_offset(-1, 0, 0),
            Err(SortError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_offset_window_on_empty_list() {
        let order = order();
        let mut source = source(&[]);
        let results = collect(&order, &mut source, &[]);

        let window = results.window_by_offset(1, 2, 2).unwrap();
        assert!(window.ids.is_empty());
        assert_eq!(window.content_count, 0);
        assert_eq!(window.target_offset, 1);
    }

    #[test]
    fn test_assertion_window_basic() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_assertion(b"n05", 2, 2).unwrap();
        assert_eq!(window.ids, vec![3, 4, 5, 6, 7]);
        assert_eq!(window.target_offset, 5);
    }

    #[test]
    fn test_assertion_between_values_picks_next() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_assertion(b"n045", 0, 0).unwrap();
        assert_eq!(window.ids, vec![5]);
        assert_eq!(window.target_offset, 5);
    }

    #[test]
    fn test_assertion_match_within_leading_before_count() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        // Match at position 2 with before_count 5: only one entry
        // precedes the match, so only one is included.
        let window = results.window_by_assertion(b"n02", 5, 1).unwrap();
        assert_eq!(window.ids, vec![1, 2, 3]);
        assert_eq!(window.target_offset, 2);
    }

    #[test]
    fn test_assertion_no_match_past_end() {
        let order = order();
        let mut source = source_ten();
        let results = ten(&order, &mut source);

        let window = results.window_by_assertion(b"zzz", 2, 2).unwrap();
        assert!(window.ids.is_empty());
        assert_eq!(window.target_offset, 11);
        assert_eq!(window.content_count, 10);
    }

    #[test]
    fn test_assertion_window_on_short_list() {
        let order = order();
        let mut source = source(&[(1, "a"), (2, "b")]);
        let results = collect(&order, &mut source, &[1, 2]);

        // List shorter than before + after + 1: everything is included.
        let window = results.window_by_assertion(b"a", 5, 5).unwrap();
        assert_eq!(window.ids, vec![1, 2]);
        assert_eq!(window.target_offset, 1);
    }
}
