use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::{Decrement, PasteStore};
use crate::error::StorageError;
use crate::paste::Paste;

/// Keeps pastes in process memory. Everything is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pastes: RwLock<HashMap<String, Paste>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pastes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Every critical section below is a single map operation that cannot panic
// halfway, so a poisoned lock still guards consistent data.
impl PasteStore for MemoryStore {
    fn insert(&self, paste: &Paste) -> Result<(), StorageError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        match pastes.entry(paste.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(paste.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(paste.clone());
                Ok(())
            }
        }
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Paste>, StorageError> {
        Ok(self
            .pastes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn decrement_remaining_views(&self, id: &str) -> Result<Decrement, StorageError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        let Some(paste) = pastes.get_mut(id) else {
            return Ok(Decrement::Missing);
        };

        Ok(paste
            .views
            .as_mut()
            .and_then(|views| views.consume())
            .map_or(Decrement::Exhausted, Decrement::Remaining))
    }

    fn purge_unavailable(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        let before = pastes.len();
        pastes.retain(|_, paste| paste.is_available(now));
        Ok(before - pastes.len())
    }
}
