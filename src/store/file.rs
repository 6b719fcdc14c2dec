//! JSON-file snapshot store.

use super::{EntitySnapshot, StateStore};
use crate::error::StorageError;
use crate::model::{EntityKey, Member};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Stores one pretty-printed JSON file per entity under a directory.
///
/// Saves go through `<key>.json.tmp`, are synced, and then renamed over
/// `<key>.json`, so a crash mid-write leaves the previous file untouched.
/// A single store-wide lock serializes every load and save.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::model::{EntityKey, Member};
/// use starwatch::store::{FileStateStore, StateStore};
///
/// # async fn example() -> Result<(), starwatch::error::StorageError> {
/// let store = FileStateStore::new("./data");
/// store.initialize().await?;
///
/// let entity = EntityKey::new("rust-lang", "rust");
/// let observed = vec![Member::new(1, "octocat")];
/// let fresh = store.diff(&entity, &observed).await?;
/// store.save(&entity, observed).await?;
/// # Ok(())
/// # }
/// ```
pub struct FileStateStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Create a store rooted at `dir`. Nothing touches the disk until
    /// [`StateStore::initialize`] or the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Directory holding the snapshot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the snapshot of `entity`.
    pub fn path_for(&self, entity: &EntityKey) -> PathBuf {
        self.dir.join(format!("{}.json", entity.storage_key()))
    }

    fn temp_path_for(&self, entity: &EntityKey) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", entity.storage_key()))
    }

    async fn read(&self, entity: &EntityKey) -> Result<EntitySnapshot, StorageError> {
        let path = self.path_for(entity);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(EntitySnapshot::empty(entity.clone()));
            }
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { path, source })
    }

    async fn write(&self, snapshot: &EntitySnapshot) -> Result<(), StorageError> {
        let path = self.path_for(&snapshot.entity);
        let temp = self.temp_path_for(&snapshot.entity);

        let data = serde_json::to_vec_pretty(snapshot).map_err(|source| StorageError::Encode {
            entity: snapshot.entity.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Write {
                path: self.dir.clone(),
                source,
            })?;

        if let Err(source) = write_synced(&temp, &data).await {
            remove_temp(&temp).await;
            return Err(StorageError::Write { path: temp, source });
        }

        if let Err(source) = tokio::fs::rename(&temp, &path).await {
            remove_temp(&temp).await;
            return Err(StorageError::Rename { path, source });
        }
        Ok(())
    }
}

async fn remove_temp(temp: &Path) {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %temp.display(), error = %e, "failed to remove temporary snapshot");
        }
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Write {
                path: self.dir.clone(),
                source,
            })?;
        tracing::info!(dir = %self.dir.display(), "file state store ready");
        Ok(())
    }

    async fn load(&self, entity: &EntityKey) -> Result<EntitySnapshot, StorageError> {
        let _guard = self.lock.lock().await;
        self.read(entity).await
    }

    async fn save(
        &self,
        entity: &EntityKey,
        members: Vec<Member>,
    ) -> Result<EntitySnapshot, StorageError> {
        let _guard = self.lock.lock().await;
        let next = self.read(entity).await?.advance(members, Utc::now());
        self.write(&next).await?;
        tracing::debug!(
            entity = %entity,
            members = next.members.len(),
            prior = next.prior.as_ref().map_or(0, Vec::len),
            "snapshot saved"
        );
        Ok(next)
    }
}
