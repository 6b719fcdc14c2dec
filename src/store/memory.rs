//! In-process snapshot store.

use super::{EntitySnapshot, StateStore};
use crate::error::StorageError;
use crate::model::{EntityKey, Member};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Keeps snapshots in memory only. State is lost on restart, so every
/// member is reported again after a restart.
#[derive(Default)]
pub struct MemoryStateStore {
    snapshots: Mutex<HashMap<EntityKey, EntitySnapshot>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `members` as the current set of `entity`.
    pub fn seeded(entity: EntityKey, members: Vec<Member>) -> Self {
        let store = Self::new();
        let snapshot = EntitySnapshot::empty(entity.clone()).advance(members, Utc::now());
        store.snapshots.lock().insert(entity, snapshot);
        store
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, entity: &EntityKey) -> Result<EntitySnapshot, StorageError> {
        Ok(self
            .snapshots
            .lock()
            .get(entity)
            .cloned()
            .unwrap_or_else(|| EntitySnapshot::empty(entity.clone())))
    }

    async fn save(
        &self,
        entity: &EntityKey,
        members: Vec<Member>,
    ) -> Result<EntitySnapshot, StorageError> {
        let mut snapshots = self.snapshots.lock();
        let previous = snapshots
            .remove(entity)
            .unwrap_or_else(|| EntitySnapshot::empty(entity.clone()));
        let next = previous.advance(members, Utc::now());
        snapshots.insert(entity.clone(), next.clone());
        Ok(next)
    }
}
