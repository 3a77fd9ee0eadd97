//! Buffered read-modify-write cache for index values
//!
//! Many record updates inside one transaction touch the same index keys.
//! The cache loads each key from the backing store once (under a
//! write-intent lock), applies every mutation in memory, and writes each
//! dirty value back exactly once at flush.
//!
//! Contract: one cache instance per transaction scope. The cache is not
//! concurrency-safe; the caller's transaction discipline provides
//! isolation between scopes touching the same keys.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::idset::{codec, IdSet, RecordId};
use crate::observability::{Event, Logger};

use super::errors::{IndexError, IndexResult};
use super::store::IndexStore;

/// One cache line: the buffered value and its dirty flag.
#[derive(Debug)]
struct BufferedEntry {
    value: IdSet,
    dirty: bool,
}

/// Passive cache statistics.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Mutations or reads served from an already-loaded entry.
    pub hits: u64,
    /// Entries loaded from the backing store (one per key per scope).
    pub loads: u64,
}

/// Per-transaction write-back cache of identifier sets.
///
/// Entries flush in the order their keys were first touched, so the
/// write pattern against the backing store is deterministic for a given
/// sequence of record updates.
#[derive(Debug, Default)]
pub struct BufferedIndexCache {
    entries: HashMap<Vec<u8>, BufferedEntry>,
    touch_order: Vec<Vec<u8>>,
    stats: CacheStats,
}

impl BufferedIndexCache {
    /// Creates an empty cache for a new transaction scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffered value for `key`, loading it on first access.
    pub fn get<S: IndexStore>(&mut self, store: &mut S, key: &[u8]) -> IndexResult<&IdSet> {
        let entry = self.entry_mut(store, key)?;
        Ok(&entry.value)
    }

    /// Adds `id` under `key` and applies the entry limit.
    ///
    /// Returns whether the buffered value changed (by the insert or by
    /// collapsing past `limit`); the entry is marked dirty if it did.
    pub fn insert_id<S: IndexStore>(
        &mut self,
        store: &mut S,
        limit: usize,
        key: &[u8],
        id: RecordId,
    ) -> IndexResult<bool> {
        let entry = self.entry_mut(store, key)?;
        let mut changed = entry.value.insert(id);
        changed |= entry.value.collapse_if_over_limit(limit);
        entry.dirty |= changed;
        Ok(changed)
    }

    /// Removes `id` from the set under `key`.
    ///
    /// Returns whether the buffered value changed. Removing from an
    /// unbounded key is a no-op: its membership is untracked.
    pub fn remove_id<S: IndexStore>(
        &mut self,
        store: &mut S,
        key: &[u8],
        id: RecordId,
    ) -> IndexResult<bool> {
        let entry = self.entry_mut(store, key)?;
        let changed = entry.value.remove(id);
        entry.dirty |= changed;
        Ok(changed)
    }

    /// Retires `key` wholesale: the buffered value becomes `Empty`,
    /// unconditionally dirty.
    ///
    /// This is the only way an unbounded key returns to tracked state.
    /// No backing-store read is needed; the previous value is irrelevant.
    pub fn remove(&mut self, key: &[u8]) {
        match self.entries.entry(key.to_vec()) {
            Entry::Occupied(entry) => {
                let entry = entry.into_mut();
                entry.value = IdSet::Empty;
                entry.dirty = true;
            }
            Entry::Vacant(slot) => {
                self.touch_order.push(key.to_vec());
                slot.insert(BufferedEntry {
                    value: IdSet::Empty,
                    dirty: true,
                });
            }
        }
    }

    /// Writes every dirty entry to the backing store in first-touch
    /// order, then clears the dirty flags.
    ///
    /// An `Empty` value deletes the key: absent key and empty set are the
    /// same state on disk. The cache itself stays populated and remains
    /// valid for further reads in the same scope.
    pub fn flush<S: IndexStore>(&mut self, store: &mut S) -> IndexResult<()> {
        let mut written = 0u64;
        for key in &self.touch_order {
            let entry = match self.entries.get_mut(key) {
                Some(entry) if entry.dirty => entry,
                _ => continue,
            };
            match &entry.value {
                IdSet::Empty => store.delete(key)?,
                value => store.write(key, &codec::encode(value))?,
            }
            entry.dirty = false;
            written += 1;
        }
        if written > 0 {
            Logger::trace(
                Event::CacheFlush.as_str(),
                &[
                    ("keys_written", &written.to_string()),
                    ("keys_cached", &self.entries.len().to_string()),
                ],
            );
        }
        Ok(())
    }

    /// Number of keys currently buffered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no keys are buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Passive hit/load statistics for this scope.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Loads the entry for `key` on first access within this scope.
    fn entry_mut<S: IndexStore>(
        &mut self,
        store: &mut S,
        key: &[u8],
    ) -> IndexResult<&mut BufferedEntry> {
        match self.entries.entry(key.to_vec()) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                Ok(entry.into_mut())
            }
            Entry::Vacant(slot) => {
                self.stats.loads += 1;
                let value = match store.read_for_update(key)? {
                    Some(bytes) => codec::decode(&bytes)
                        .map_err(|source| IndexError::corrupt_value(key, source))?,
                    None => IdSet::Empty,
                };
                self.touch_order.push(key.to_vec());
                Ok(slot.insert(BufferedEntry {
                    value,
                    dirty: false,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::StoreError;

    /// In-memory store that records every call for assertion.
    #[derive(Default)]
    struct MockStore {
        data: HashMap<Vec<u8>, Vec<u8>>,
        reads: Vec<Vec<u8>>,
        writes: Vec<Vec<u8>>,
        deletes: Vec<Vec<u8>>,
    }

    impl IndexStore for MockStore {
        fn read_for_update(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            self.reads.push(key.to_vec());
            Ok(self.data.get(key).cloned())
        }

        fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
            self.writes.push(key.to_vec());
            self.data.insert(key.to_vec(), value.to_vec());
            Ok(())
        }

        fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
            self.deletes.push(key.to_vec());
            self.data.remove(key);
            Ok(())
        }
    }

    #[test]
    fn test_one_read_per_key_per_scope() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        cache.insert_id(&mut store, 0, b"cn=a", 1).unwrap();
        cache.insert_id(&mut store, 0, b"cn=a", 2).unwrap();
        cache.remove_id(&mut store, b"cn=a", 1).unwrap();
        cache.get(&mut store, b"cn=a").unwrap();

        assert_eq!(store.reads.len(), 1);
        assert_eq!(cache.stats().loads, 1);
        assert_eq!(cache.stats().hits, 3);
    }

    #[test]
    fn test_flush_writes_in_first_touch_order() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        cache.insert_id(&mut store, 0, b"k2", 1).unwrap();
        cache.insert_id(&mut store, 0, b"k1", 1).unwrap();
        cache.insert_id(&mut store, 0, b"k2", 2).unwrap();
        cache.flush(&mut store).unwrap();

        assert_eq!(store.writes, vec![b"k2".to_vec(), b"k1".to_vec()]);
    }

    #[test]
    fn test_flush_writes_each_dirty_key_once() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        for id in 0..10 {
            cache.insert_id(&mut store, 0, b"key", id).unwrap();
        }
        cache.flush(&mut store).unwrap();

        assert_eq!(store.writes.len(), 1);
        let stored = crate::idset::codec::decode(&store.data[&b"key".to_vec()]).unwrap();
        assert_eq!(stored.len(), Some(10));
    }

    #[test]
    fn test_flush_skips_clean_entries() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        cache.insert_id(&mut store, 0, b"key", 1).unwrap();
        cache.flush(&mut store).unwrap();
        cache.flush(&mut store).unwrap();

        assert_eq!(store.writes.len(), 1);
    }

    #[test]
    fn test_flush_keeps_cache_warm() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        cache.insert_id(&mut store, 0, b"key", 7).unwrap();
        cache.flush(&mut store).unwrap();
        let set = cache.get(&mut store, b"key").unwrap();

        assert_eq!(set.ids(), Some(&[7][..]));
        assert_eq!(store.reads.len(), 1);
    }

    #[test]
    fn test_empty_value_deletes_key_on_flush() {
        let mut store = MockStore::default();
        store.data.insert(b"key".to_vec(), 5u64.to_be_bytes().to_vec());

        let mut cache = BufferedIndexCache::new();
        cache.remove_id(&mut store, b"key", 5).unwrap();
        cache.flush(&mut store).unwrap();

        assert_eq!(store.deletes, vec![b"key".to_vec()]);
        assert!(!store.data.contains_key(&b"key".to_vec()));
    }

    #[test]
    fn test_insert_collapses_past_limit() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        cache.insert_id(&mut store, 2, b"key", 1).unwrap();
        cache.insert_id(&mut store, 2, b"key", 2).unwrap();
        assert!(cache.get(&mut store, b"key").unwrap().is_defined());

        cache.insert_id(&mut store, 2, b"key", 3).unwrap();
        assert!(cache.get(&mut store, b"key").unwrap().is_unbounded());
    }

    #[test]
    fn test_remove_key_resets_unbounded() {
        let mut store = MockStore::default();
        let mut cache = BufferedIndexCache::new();

        for id in [1, 2, 3] {
            cache.insert_id(&mut store, 2, b"key", id).unwrap();
        }
        assert!(cache.get(&mut store, b"key").unwrap().is_unbounded());

        cache.remove(b"key");
        cache.insert_id(&mut store, 2, b"key", 9).unwrap();

        assert_eq!(cache.get(&mut store, b"key").unwrap().ids(), Some(&[9][..]));
    }

    #[test]
    fn test_remove_unknown_key_is_dirty_empty() {
        let mut store = MockStore::default();
        store.data.insert(b"key".to_vec(), 5u64.to_be_bytes().to_vec());

        let mut cache = BufferedIndexCache::new();
        cache.remove(b"key");
        cache.flush(&mut store).unwrap();

        // Retiring a key never reads the old value.
        assert!(store.reads.is_empty());
        assert_eq!(store.deletes, vec![b"key".to_vec()]);
    }

    #[test]
    fn test_corrupt_stored_value_is_reported() {
        let mut store = MockStore::default();
        store.data.insert(b"key".to_vec(), vec![1, 2, 3]);

        let mut cache = BufferedIndexCache::new();
        let err = cache.get(&mut store, b"key").unwrap_err();
        assert!(matches!(err, IndexError::CorruptValue { .. }));
    }

    #[test]
    fn test_existing_value_loaded_before_mutation() {
        let mut store = MockStore::default();
        let mut existing = Vec::new();
        existing.extend_from_slice(&3u64.to_be_bytes());
        existing.extend_from_slice(&8u64.to_be_bytes());
        store.data.insert(b"key".to_vec(), existing);

        let mut cache = BufferedIndexCache::new();
        cache.insert_id(&mut store, 0, b"key", 5).unwrap();

        assert_eq!(
            cache.get(&mut store, b"key").unwrap().ids(),
            Some(&[3, 5, 8][..])
        );
    }
}
