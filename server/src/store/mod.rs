//! Persistence for pastes.
//!
//! The engine only ever talks to a [`PasteStore`]; which one backs a running
//! server is decided in `main`.

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::paste::Paste;

pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;

/// Outcome of [`PasteStore::decrement_remaining_views`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decrement {
    /// One view was consumed; this many are left.
    Remaining(u32),
    /// The budget was already zero, or the paste has no budget. Nothing changed.
    Exhausted,
    /// No paste with that id.
    Missing,
}

pub trait PasteStore: Send + Sync {
    /// Persists a new paste. Fails with [`StorageError::Conflict`] if the id is
    /// taken.
    fn insert(&self, paste: &Paste) -> Result<(), StorageError>;

    fn find_by_id(&self, id: &str) -> Result<Option<Paste>, StorageError>;

    /// Decrements the remaining views of a paste if and only if they are
    /// positive, as one indivisible step. Concurrent callers never observe the
    /// same pre-decrement value.
    fn decrement_remaining_views(&self, id: &str) -> Result<Decrement, StorageError>;

    /// Deletes every paste that can never be read again at `now`, returning
    /// how many were removed.
    fn purge_unavailable(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;

    fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
