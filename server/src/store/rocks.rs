use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{IteratorMode, WriteBatch, DB};
use tracing::{debug, warn};

use super::{Decrement, PasteStore};
use crate::error::StorageError;
use crate::paste::Paste;

/// Pastes persisted in a RocksDB directory, one bincode record per id.
pub struct RocksStore {
    db: DB,
    /// Serializes every read-modify-write. Plain reads skip it.
    write_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = DB::open_default(path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn load(&self, id: &str) -> Result<Option<Paste>, StorageError> {
        self.db
            .get(id.as_bytes())?
            .map(|bytes| bincode::deserialize(&bytes).map_err(StorageError::from))
            .transpose()
    }

    fn store(&self, paste: &Paste) -> Result<(), StorageError> {
        let value = bincode::serialize(paste)?;
        self.db.put(paste.id.as_bytes(), value)?;
        Ok(())
    }
}

impl PasteStore for RocksStore {
    fn insert(&self, paste: &Paste) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.db.get_pinned(paste.id.as_bytes())?.is_some() {
            return Err(StorageError::Conflict(paste.id.clone()));
        }
        self.store(paste)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Paste>, StorageError> {
        self.load(id)
    }

    fn decrement_remaining_views(&self, id: &str) -> Result<Decrement, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut paste) = self.load(id)? else {
            return Ok(Decrement::Missing);
        };

        let Some(remaining) = paste.views.as_mut().and_then(|views| views.consume()) else {
            return Ok(Decrement::Exhausted);
        };

        // Only report the view as consumed once the write has landed.
        self.store(&paste)?;
        Ok(Decrement::Remaining(remaining))
    }

    fn purge_unavailable(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut batch = WriteBatch::default();
        let mut removed = 0;

        for entry in self.db.iterator(IteratorMode::Start) {
            let (key, value) = entry?;
            match bincode::deserialize::<Paste>(&value) {
                Ok(paste) if !paste.is_available(now) => {
                    batch.delete(key);
                    removed += 1;
                }
                Ok(_) => (),
                Err(e) => warn!("Skipping undecodable record during cleanup: {}", e),
            }
        }

        if removed > 0 {
            self.db.write(batch)?;
        }
        debug!(removed, "Purged unavailable pastes");
        Ok(removed)
    }

    fn ping(&self) -> Result<(), StorageError> {
        // Any read that reaches the backend will do.
        self.db.get_pinned(b"")?;
        Ok(())
    }
}
