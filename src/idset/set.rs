//! The compact identifier-set value type
//!
//! Invariants:
//! - A `Defined` array is strictly ascending with no duplicates.
//! - A `Defined` array is never empty; removing the last identifier
//!   yields `Empty`. This keeps the on-disk encoding unambiguous.
//! - Once a set collapses to `Unbounded` it stays `Unbounded` until the
//!   whole key is retired (see `BufferedIndexCache::remove`).

/// Record identifier type
pub type RecordId = u64;

/// The set of record identifiers associated with one index key.
///
/// `Unbounded` means the true set grew past the entry limit and is no
/// longer tracked precisely. Query consumers must treat an unbounded key
/// as "all records" and re-verify candidates by other means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSet {
    /// No identifiers match this key
    Empty,
    /// Strictly ascending, non-empty identifier array
    Defined(Vec<RecordId>),
    /// Too many identifiers match this key to track precisely
    Unbounded,
}

impl IdSet {
    /// Builds a defined set from arbitrary identifiers (sorted, deduplicated).
    ///
    /// An empty slice yields `Empty`.
    pub fn of(ids: &[RecordId]) -> Self {
        if ids.is_empty() {
            return IdSet::Empty;
        }
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        IdSet::Defined(sorted)
    }

    /// Returns whether no identifiers are tracked.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdSet::Empty)
    }

    /// Returns whether the set is tracked precisely.
    pub fn is_defined(&self) -> bool {
        matches!(self, IdSet::Defined(_))
    }

    /// Returns whether the set collapsed past the entry limit.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, IdSet::Unbounded)
    }

    /// Returns the tracked size, or `None` for an unbounded set.
    pub fn len(&self) -> Option<usize> {
        match self {
            IdSet::Empty => Some(0),
            IdSet::Defined(ids) => Some(ids.len()),
            IdSet::Unbounded => None,
        }
    }

    /// Returns the identifier array of a defined set.
    pub fn ids(&self) -> Option<&[RecordId]> {
        match self {
            IdSet::Defined(ids) => Some(ids),
            _ => None,
        }
    }

    /// Membership test.
    ///
    /// An unbounded set reports every identifier as present; the caller
    /// is responsible for re-verifying against the record itself.
    pub fn contains(&self, id: RecordId) -> bool {
        match self {
            IdSet::Empty => false,
            IdSet::Defined(ids) => ids.binary_search(&id).is_ok(),
            IdSet::Unbounded => true,
        }
    }

    /// Inserts an identifier. Returns whether the set changed.
    ///
    /// Inserting into an unbounded set is a no-op: the identifier is
    /// implicitly a member already.
    pub fn insert(&mut self, id: RecordId) -> bool {
        match self {
            IdSet::Empty => {
                *self = IdSet::Defined(vec![id]);
                true
            }
            IdSet::Defined(ids) => match ids.binary_search(&id) {
                Ok(_) => false,
                Err(pos) => {
                    ids.insert(pos, id);
                    true
                }
            },
            IdSet::Unbounded => false,
        }
    }

    /// Removes an identifier. Returns whether the set changed.
    ///
    /// No-op on `Empty` and `Unbounded`: an unbounded set does not track
    /// individual members, so there is nothing to remove from it.
    pub fn remove(&mut self, id: RecordId) -> bool {
        match self {
            IdSet::Defined(ids) => match ids.binary_search(&id) {
                Ok(pos) => {
                    ids.remove(pos);
                    if ids.is_empty() {
                        *self = IdSet::Empty;
                    }
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Merges every identifier of `other` into this set.
    ///
    /// Disjoint ranges are handled by pure concatenation before falling
    /// back to a linear merge. Bulk builds union long ascending runs key
    /// by key, so the concatenation case dominates there.
    pub fn union_with(&mut self, other: &IdSet) {
        match (&mut *self, other) {
            (_, IdSet::Empty) => {}
            (IdSet::Unbounded, _) => {}
            (_, IdSet::Unbounded) => *self = IdSet::Unbounded,
            (IdSet::Empty, IdSet::Defined(_)) => *self = other.clone(),
            (IdSet::Defined(a), IdSet::Defined(b)) => {
                // a and b are both non-empty here.
                if *a.last().unwrap() < b[0] {
                    a.extend_from_slice(b);
                } else if *b.last().unwrap() < a[0] {
                    let mut merged = Vec::with_capacity(a.len() + b.len());
                    merged.extend_from_slice(b);
                    merged.append(a);
                    *a = merged;
                } else {
                    *a = merge_dedup(a, b);
                }
            }
        }
    }

    /// Removes every identifier present in `other`, in one linear pass.
    ///
    /// An unbounded receiver stays unbounded (its members are untracked).
    /// An unbounded argument clears the receiver: every identifier is
    /// presumed present in it.
    pub fn difference_with(&mut self, other: &IdSet) {
        match (&mut *self, other) {
            (IdSet::Empty, _) | (IdSet::Unbounded, _) | (_, IdSet::Empty) => {}
            (IdSet::Defined(_), IdSet::Unbounded) => *self = IdSet::Empty,
            (IdSet::Defined(a), IdSet::Defined(b)) => {
                let mut cursor = 0;
                a.retain(|id| {
                    while cursor < b.len() && b[cursor] < *id {
                        cursor += 1;
                    }
                    cursor >= b.len() || b[cursor] != *id
                });
                if a.is_empty() {
                    *self = IdSet::Empty;
                }
            }
        }
    }

    /// Collapses the set to `Unbounded` once its size exceeds `limit`.
    ///
    /// A key tracks at most `limit` identifiers precisely; one more and
    /// it is no longer worth maintaining. A limit of 0 disables
    /// collapsing. Returns whether the set changed. Collapse is
    /// one-way: further inserts into an unbounded set are no-ops, and
    /// only retiring the whole key resets it.
    pub fn collapse_if_over_limit(&mut self, limit: usize) -> bool {
        if limit == 0 {
            return false;
        }
        match self {
            IdSet::Defined(ids) if ids.len() > limit => {
                *self = IdSet::Unbounded;
                true
            }
            _ => false,
        }
    }
}

/// Linear merge of two sorted unique arrays with overlapping ranges.
fn merge_dedup(a: &[RecordId], b: &[RecordId]) -> Vec<RecordId> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            merged.push(a[i]);
            i += 1;
        } else if b[j] < a[i] {
            merged.push(b[j]);
            j += 1;
        } else {
            merged.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
