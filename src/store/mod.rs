//! Per-entity member snapshots and the identity diff.
//!
//! A [`StateStore`] keeps, for each monitored repository, the member set seen
//! on the last successful check plus the set before it. Everything else about
//! history is discarded.

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::core::{StorageKind, StorageSettings};
use crate::error::StorageError;
use crate::model::{EntityKey, Member};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Persisted state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The repository this snapshot belongs to.
    #[serde(flatten)]
    pub entity: EntityKey,
    /// When the snapshot was last written, `None` if never.
    pub last_check: Option<DateTime<Utc>>,
    /// Members seen on the last successful check. Identities are unique.
    pub members: Vec<Member>,
    /// Members seen on the check before that, if that set was non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Vec<Member>>,
}

impl EntitySnapshot {
    /// Snapshot of an entity that has never been saved.
    pub fn empty(entity: EntityKey) -> Self {
        Self {
            entity,
            last_check: None,
            members: Vec::new(),
            prior: None,
        }
    }

    /// True when no member has ever been recorded.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Next snapshot: `members` becomes current and the current set is
    /// demoted to prior. An empty current set leaves no prior behind.
    pub fn advance(self, members: Vec<Member>, now: DateTime<Utc>) -> Self {
        let prior = if self.members.is_empty() {
            None
        } else {
            Some(self.members)
        };
        Self {
            entity: self.entity,
            last_check: Some(now),
            members: dedup(members),
            prior,
        }
    }
}

/// Members of `observed` whose identity is not in `known`'s current set.
///
/// Against an empty snapshot every observed member is new. Duplicate
/// identities in `observed` are reported once.
pub fn new_members(known: &EntitySnapshot, observed: &[Member]) -> Vec<Member> {
    let known: HashSet<u64> = known.members.iter().map(|m| m.id).collect();
    let mut reported = HashSet::new();
    observed
        .iter()
        .filter(|m| !known.contains(&m.id) && reported.insert(m.id))
        .cloned()
        .collect()
}

fn dedup(members: Vec<Member>) -> Vec<Member> {
    let mut seen = HashSet::with_capacity(members.len());
    members.into_iter().filter(|m| seen.insert(m.id)).collect()
}

/// Durable per-entity snapshot storage.
///
/// Writes for the same entity never interleave; a failed or interrupted save
/// leaves the previous snapshot loadable.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Prepare the backing store (create directories and the like).
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Current snapshot of `entity`. A never-saved entity yields an empty
    /// snapshot rather than an error.
    async fn load(&self, entity: &EntityKey) -> Result<EntitySnapshot, StorageError>;

    /// Record `members` as the current set, demoting the previous one.
    /// Returns the snapshot that was written.
    async fn save(
        &self,
        entity: &EntityKey,
        members: Vec<Member>,
    ) -> Result<EntitySnapshot, StorageError>;

    /// Members of `observed` not present in the stored current set.
    async fn diff(
        &self,
        entity: &EntityKey,
        observed: &[Member],
    ) -> Result<Vec<Member>, StorageError> {
        let snapshot = self.load(entity).await?;
        Ok(new_members(&snapshot, observed))
    }

    /// When `entity` was last saved.
    async fn last_check(&self, entity: &EntityKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.load(entity).await?.last_check)
    }
}

/// Build the store selected by `storage.type`.
pub fn from_settings(settings: &StorageSettings) -> Arc<dyn StateStore> {
    match settings.kind {
        StorageKind::File => Arc::new(FileStateStore::new(&settings.path)),
        StorageKind::Memory => Arc::new(MemoryStateStore::new()),
    }
}
