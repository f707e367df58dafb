//! Folder service for Strongbox.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::db::Database;
use crate::quota::QuotaManager;
use crate::{Result, StrongboxError};

use super::folder::{Folder, FolderRepository, FolderSummary, NewFolder};
use super::validate_name;

/// Outcome of a recursive folder delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FolderDeletion {
    /// Committed files removed with the subtree.
    pub deleted_files: u64,
    /// Bytes released from the owner's quota.
    pub freed_bytes: u64,
}

/// Folder service for managing a user's folder tree.
pub struct FolderService<'a> {
    db: &'a Database,
    blobs: &'a dyn BlobStore,
}

impl<'a> FolderService<'a> {
    /// Create a new FolderService.
    pub fn new(db: &'a Database, blobs: &'a dyn BlobStore) -> Self {
        Self { db, blobs }
    }

    /// Create a folder under `parent_id` (or at root level).
    pub async fn create(
        &self,
        owner_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder> {
        self.create_inner(owner_id, name, parent_id)
            .await
            .map_err(|e| e.logged("folder create"))
    }

    async fn create_inner(
        &self,
        owner_id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Folder> {
        validate_name(name)?;
        let repo = FolderRepository::new(self.db.pool());

        if let Some(parent_id) = parent_id {
            match repo.get_by_id(parent_id).await? {
                Some(parent) if parent.owner_id == owner_id => {}
                _ => return Err(StrongboxError::NotFound("parent folder".to_string())),
            }
        }

        if repo.name_taken(owner_id, parent_id, name, None).await? {
            return Err(StrongboxError::DuplicateName(name.to_string()));
        }

        // The unique index closes the race between the check and the insert
        let folder = repo
            .create(&NewFolder::new(owner_id, name).with_parent(parent_id))
            .await?;
        debug!(folder_id = folder.id, owner_id, "Folder created");
        Ok(folder)
    }

    /// Get a folder.
    pub async fn get(&self, folder_id: i64, owner_id: i64) -> Result<Folder> {
        self.owned_folder(folder_id, owner_id)
            .await
            .map_err(|e| e.logged("folder lookup"))
    }

    /// Rename a folder, keeping sibling names unique.
    pub async fn rename(&self, folder_id: i64, owner_id: i64, new_name: &str) -> Result<Folder> {
        self.rename_inner(folder_id, owner_id, new_name)
            .await
            .map_err(|e| e.logged("folder rename"))
    }

    async fn rename_inner(&self, folder_id: i64, owner_id: i64, new_name: &str) -> Result<Folder> {
        validate_name(new_name)?;
        let folder = self.owned_folder(folder_id, owner_id).await?;
        let repo = FolderRepository::new(self.db.pool());

        if repo
            .name_taken(owner_id, folder.parent_id, new_name, Some(folder_id))
            .await?
        {
            return Err(StrongboxError::DuplicateName(new_name.to_string()));
        }

        repo.rename(folder_id, new_name)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("folder".to_string()))
    }

    /// List direct subfolders of `parent_id` (or root level), by name.
    pub async fn list(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<FolderSummary>> {
        self.list_inner(owner_id, parent_id)
            .await
            .map_err(|e| e.logged("folder list"))
    }

    async fn list_inner(&self, owner_id: i64, parent_id: Option<i64>) -> Result<Vec<FolderSummary>> {
        if let Some(parent_id) = parent_id {
            self.owned_folder(parent_id, owner_id).await?;
        }
        FolderRepository::new(self.db.pool())
            .list_children(owner_id, parent_id)
            .await
    }

    /// Delete a folder and everything below it.
    ///
    /// Blob deletes are best-effort: a failure is logged and the object is
    /// left behind, but the metadata and quota still converge. The final
    /// transaction recomputes the subtree so uploads that committed in the
    /// meantime are accounted for.
    pub async fn delete(&self, folder_id: i64, owner_id: i64) -> Result<FolderDeletion> {
        self.delete_inner(folder_id, owner_id)
            .await
            .map_err(|e| e.logged("folder delete"))
    }

    async fn delete_inner(&self, folder_id: i64, owner_id: i64) -> Result<FolderDeletion> {
        self.owned_folder(folder_id, owner_id).await?;

        let files = {
            let mut conn = self.db.pool().acquire().await?;
            let folder_ids = FolderRepository::collect_subtree(&mut conn, folder_id).await?;
            FolderRepository::committed_files_in(&mut conn, &folder_ids).await?
        };
        debug!(folder_id, files = files.len(), "Deleting folder subtree blobs");

        let mut orphaned = 0usize;
        for file in &files {
            if let Err(e) = self.blobs.delete(&file.object_key).await {
                orphaned += 1;
                warn!(
                    folder_id,
                    file_id = file.id,
                    key = %file.object_key,
                    error = %e,
                    "Failed to delete blob during folder delete"
                );
            }
        }

        let mut tx = self.db.begin().await?;
        if !FolderRepository::touch(&mut tx, folder_id, owner_id).await? {
            return Err(StrongboxError::NotFound("folder".to_string()));
        }
        let folder_ids = FolderRepository::collect_subtree(&mut tx, folder_id).await?;
        let committed = FolderRepository::committed_files_in(&mut tx, &folder_ids).await?;
        let freed_bytes: u64 = committed.iter().map(|f| f.size).sum();

        if !FolderRepository::delete(&mut tx, folder_id, owner_id).await? {
            return Err(StrongboxError::NotFound("folder".to_string()));
        }
        QuotaManager::release(&mut tx, owner_id, freed_bytes).await?;
        tx.commit().await?;

        let deletion = FolderDeletion {
            deleted_files: committed.len() as u64,
            freed_bytes,
        };
        info!(
            folder_id,
            owner_id,
            folders = folder_ids.len(),
            deleted_files = deletion.deleted_files,
            freed_bytes,
            orphaned,
            "Folder deleted"
        );
        Ok(deletion)
    }

    async fn owned_folder(&self, folder_id: i64, owner_id: i64) -> Result<Folder> {
        let folder = FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("folder".to_string()))?;

        if folder.owner_id != owner_id {
            return Err(StrongboxError::AccessDenied("folder".to_string()));
        }
        Ok(folder)
    }
}
