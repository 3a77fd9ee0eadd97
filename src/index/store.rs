//! Backing-store seam for index values
//!
//! The engine never opens or locks the transactional KV store itself; it
//! reads and writes encoded identifier-set values through this trait.
//! Transactionality, cursoring and locking belong to the implementation.

use thiserror::Error;

/// Error reported by a backing-store implementation.
///
/// The engine treats every store failure as fatal to the current
/// operation and propagates it unchanged.
#[derive(Debug, Error)]
#[error("index store failure: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl StoreError {
    /// Creates a store error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a store error wrapping an I/O failure.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// The external transactional key-value store holding index entries.
///
/// One implementation instance corresponds to one transaction scope.
/// `read_for_update` must acquire whatever read-with-intent-to-write lock
/// the store offers, so that the value cannot change between the load and
/// the eventual write-back at flush.
pub trait IndexStore {
    /// Reads the value stored under `key`, taking a write-intent lock.
    ///
    /// Returns `None` if the key is absent.
    fn read_for_update(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes (inserts or replaces) the value stored under `key`.
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deletes `key`. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
}
