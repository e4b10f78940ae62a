use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Collection, Deleted};
use crate::store::RecordStore;

/// StorageError
///
/// Failures of the on-disk media layout.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("filesystem error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a valid path segment")]
    InvalidSegment(String),
}

impl StorageError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// StagedDir
///
/// A collection directory moved aside ahead of a destructive operation.
/// `staged` is `None` when there was nothing on disk to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDir {
    pub original: PathBuf,
    pub staged: Option<PathBuf>,
}

/// MediaStorage
///
/// The contract for the on-disk media layout: one directory per collection
/// under `<kind>/<collection hashid>`, and a trash area where directories wait
/// until the database agrees they can go.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Creates the directory backing a new collection.
    async fn create_dir(&self, kind: &str, hashid: &str) -> Result<PathBuf, StorageError>;

    /// Moves a collection directory into the trash area.
    async fn stage_for_deletion(&self, kind: &str, hashid: &str)
    -> Result<StagedDir, StorageError>;

    /// Moves a staged directory back where it came from.
    async fn restore(&self, staged: &StagedDir) -> Result<(), StorageError>;

    /// Physically removes a staged directory.
    async fn purge(&self, staged: &StagedDir) -> Result<(), StorageError>;

    /// Removes one media file from a collection directory. Missing files are
    /// not an error.
    async fn remove_file(
        &self,
        kind: &str,
        hashid: &str,
        file_name: &str,
    ) -> Result<(), StorageError>;
}

/// LocalMediaStorage
///
/// `MediaStorage` over the local filesystem through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    uploads_dir: PathBuf,
    trash_dir: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(uploads_dir: impl Into<PathBuf>, trash_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            trash_dir: trash_dir.into(),
        }
    }

    /// Creates the uploads and trash roots if they are missing. Safe to call
    /// at every startup.
    pub async fn ensure_layout(&self) -> Result<(), StorageError> {
        for dir in [&self.uploads_dir, &self.trash_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(StorageError::io(dir))?;
        }
        Ok(())
    }

    pub fn collection_dir(&self, kind: &str, hashid: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .uploads_dir
            .join(checked_segment(kind)?)
            .join(checked_segment(hashid)?))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn create_dir(&self, kind: &str, hashid: &str) -> Result<PathBuf, StorageError> {
        let dir = self.collection_dir(kind, hashid)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::io(&dir))?;
        tracing::debug!(path = %dir.display(), "collection directory created");
        Ok(dir)
    }

    async fn stage_for_deletion(
        &self,
        kind: &str,
        hashid: &str,
    ) -> Result<StagedDir, StorageError> {
        let original = self.collection_dir(kind, hashid)?;
        if !tokio::fs::try_exists(&original)
            .await
            .map_err(StorageError::io(&original))?
        {
            tracing::warn!(path = %original.display(), "nothing on disk to stage");
            return Ok(StagedDir {
                original,
                staged: None,
            });
        }

        tokio::fs::create_dir_all(&self.trash_dir)
            .await
            .map_err(StorageError::io(&self.trash_dir))?;
        let staged = self.trash_dir.join(format!("{kind}-{hashid}-{}", Uuid::new_v4()));
        tokio::fs::rename(&original, &staged)
            .await
            .map_err(StorageError::io(&original))?;

        tracing::debug!(from = %original.display(), to = %staged.display(), "directory staged");
        Ok(StagedDir {
            original,
            staged: Some(staged),
        })
    }

    async fn restore(&self, staged: &StagedDir) -> Result<(), StorageError> {
        let Some(path) = &staged.staged else {
            return Ok(());
        };
        tokio::fs::rename(path, &staged.original)
            .await
            .map_err(StorageError::io(path))
    }

    async fn purge(&self, staged: &StagedDir) -> Result<(), StorageError> {
        let Some(path) = &staged.staged else {
            return Ok(());
        };
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(StorageError::io(path))
    }

    async fn remove_file(
        &self,
        kind: &str,
        hashid: &str,
        file_name: &str,
    ) -> Result<(), StorageError> {
        let path = self
            .collection_dir(kind, hashid)?
            .join(checked_segment(file_name)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path)(e)),
        }
    }
}

/// checked_segment
///
/// Accepts a single path component only, refusing anything that would
/// navigate out of the uploads tree.
fn checked_segment(segment: &str) -> Result<&str, StorageError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\']);
    if valid {
        Ok(segment)
    } else {
        Err(StorageError::InvalidSegment(segment.to_string()))
    }
}

/// StorageState
///
/// The concrete type used to share the media storage across the application state.
pub type StorageState = Arc<dyn MediaStorage>;

/// create_collection_backed
///
/// Persists a new collection and creates its directory. When the directory
/// cannot be created the row is deleted again.
pub async fn create_collection_backed<C: Collection>(
    store: &dyn RecordStore,
    storage: &dyn MediaStorage,
    collection: &mut C,
) -> Result<(), ApiError> {
    collection.create(store).await?;

    if let Err(error) = storage.create_dir(C::DIRECTORY, collection.hashid()).await {
        tracing::error!(%error, hashid = collection.hashid(), "collection directory creation failed");
        if let Err(rollback) = collection.delete(store).await {
            tracing::error!(error = %rollback, "could not delete collection row after directory failure");
        }
        return Err(error.into());
    }
    Ok(())
}

/// delete_collection_staged
///
/// Deletes a collection and its members while keeping disk and database in
/// step: the directory is staged first, purged once the cascade succeeded,
/// and moved back when it failed.
pub async fn delete_collection_staged<C: Collection>(
    store: &dyn RecordStore,
    storage: &dyn MediaStorage,
    collection: &mut C,
) -> Result<Deleted, ApiError> {
    let staged = storage
        .stage_for_deletion(C::DIRECTORY, collection.hashid())
        .await?;

    match collection.delete(store).await {
        Ok(deleted) => {
            if let Err(error) = storage.purge(&staged).await {
                tracing::warn!(%error, "staged directory left in trash");
            }
            Ok(deleted)
        }
        Err(error) => {
            if let Err(restore) = storage.restore(&staged).await {
                tracing::error!(error = %restore, path = %staged.original.display(), "staged directory could not be restored");
            }
            Err(error.into())
        }
    }
}
