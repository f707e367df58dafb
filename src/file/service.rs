//! File service for Strongbox.
//!
//! This module provides high-level file operations including:
//! - Upload with quota checks and pending-row compensation
//! - Download with ownership checks and per-file decryption
//! - Move, listing and deletion with quota release

use tracing::{debug, info, warn};

use crate::blob::{object_key, BlobMetadata, BlobStore};
use crate::crypto::{generate_salt, KeyDeriver};
use crate::db::Database;
use crate::quota::QuotaManager;
use crate::{Result, StrongboxError};

use super::folder::FolderRepository;
use super::metadata::{FileRecord, FileRepository, NewFile};
use super::{validate_name, Page, PageRequest};

/// MIME type used when the caller supplies none.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Request data for file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Display filename.
    pub name: String,
    /// MIME type (empty for `application/octet-stream`).
    pub mime_type: String,
    /// File content.
    pub content: Vec<u8>,
    /// Folder to upload into (None for root level).
    pub folder_id: Option<i64>,
}

impl UploadRequest {
    /// Create a new upload request at root level.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
            folder_id: None,
        }
    }

    /// Upload into a folder.
    pub fn in_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

/// Result of a file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Decrypted content.
    pub content: Vec<u8>,
    /// Display filename.
    pub filename: String,
    /// MIME type.
    pub mime_type: String,
}

/// File service for managing encrypted uploads and downloads.
pub struct FileService<'a> {
    db: &'a Database,
    blobs: &'a dyn BlobStore,
    keys: &'a KeyDeriver,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, blobs: &'a dyn BlobStore, keys: &'a KeyDeriver) -> Self {
        Self { db, blobs, keys }
    }

    /// Upload a file.
    ///
    /// The row is inserted as pending, the encrypted blob is written, and
    /// only then is the row committed together with the quota increment.
    /// If anything after the insert fails, the pending row is removed,
    /// the blob is deleted on a best-effort basis and usage is unchanged.
    pub async fn upload(&self, owner_id: i64, request: &UploadRequest) -> Result<FileRecord> {
        self.upload_inner(owner_id, request)
            .await
            .map_err(|e| e.logged("file upload"))
    }

    async fn upload_inner(&self, owner_id: i64, request: &UploadRequest) -> Result<FileRecord> {
        validate_name(&request.name)?;
        if let Some(folder_id) = request.folder_id {
            self.require_folder(owner_id, folder_id).await?;
        }

        let size = request.content.len() as u64;
        QuotaManager::new(self.db.pool())
            .check(owner_id, size)
            .await?;

        let mime_type = if request.mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            request.mime_type.clone()
        };

        let repo = FileRepository::new(self.db.pool());
        let salt = generate_salt();
        let file_id = repo
            .create_pending(&NewFile {
                name: request.name.clone(),
                size,
                mime_type: mime_type.clone(),
                encryption_salt: salt.clone(),
                folder_id: request.folder_id,
                owner_id,
            })
            .await?;
        let key = object_key(owner_id, file_id);
        debug!(file_id, owner_id, size, "Pending upload created");

        if let Err(e) = self
            .store_and_commit(owner_id, file_id, &key, &salt, &mime_type, request)
            .await
        {
            self.abandon_upload(file_id, &key).await;
            return Err(e);
        }

        let record = repo
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("file".to_string()))?;
        info!(
            file_id,
            owner_id,
            size,
            name = %record.name,
            "Upload committed"
        );
        Ok(record)
    }

    async fn store_and_commit(
        &self,
        owner_id: i64,
        file_id: i64,
        key: &str,
        salt: &str,
        mime_type: &str,
        request: &UploadRequest,
    ) -> Result<()> {
        let file_key = self.keys.derive_file_key(salt, file_id)?;
        self.blobs
            .put(
                key,
                &request.content,
                &file_key,
                &BlobMetadata::new(mime_type, request.name.as_str()),
            )
            .await?;

        let mut tx = self.db.begin().await?;
        if !FileRepository::commit(&mut tx, file_id, key).await? {
            return Err(StrongboxError::NotFound("pending upload".to_string()));
        }
        QuotaManager::reserve(&mut tx, owner_id, request.content.len() as u64).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Compensate a failed upload. Never fails; problems are logged.
    async fn abandon_upload(&self, file_id: i64, key: &str) {
        match FileRepository::new(self.db.pool())
            .delete_pending(file_id)
            .await
        {
            Ok(_) => debug!(file_id, "Pending upload removed"),
            Err(e) => warn!(file_id, error = %e, "Failed to remove pending upload row"),
        }

        if let Err(e) = self.blobs.delete(key).await {
            warn!(file_id, key, error = %e, "Failed to remove blob of abandoned upload");
        }
    }

    /// Download and decrypt a file.
    pub async fn download(&self, file_id: i64, owner_id: i64) -> Result<Download> {
        self.download_inner(file_id, owner_id)
            .await
            .map_err(|e| e.logged("file download"))
    }

    async fn download_inner(&self, file_id: i64, owner_id: i64) -> Result<Download> {
        let file = self.owned_file(file_id, owner_id).await?;
        let file_key = self
            .keys
            .derive_file_key(&file.encryption_salt, file.id)?;
        let content = self.blobs.get(&file.object_key, &file_key).await?;
        debug!(file_id, bytes = content.len(), "Blob read");

        Ok(Download {
            content,
            filename: file.name,
            mime_type: file.mime_type,
        })
    }

    /// Get committed file metadata.
    pub async fn get(&self, file_id: i64, owner_id: i64) -> Result<FileRecord> {
        self.owned_file(file_id, owner_id)
            .await
            .map_err(|e| e.logged("file lookup"))
    }

    /// Delete a file.
    ///
    /// The blob goes first; if that fails nothing else changes. The row
    /// delete and quota release then commit together.
    pub async fn delete(&self, file_id: i64, owner_id: i64) -> Result<()> {
        self.delete_inner(file_id, owner_id)
            .await
            .map_err(|e| e.logged("file delete"))
    }

    async fn delete_inner(&self, file_id: i64, owner_id: i64) -> Result<()> {
        let file = self.owned_file(file_id, owner_id).await?;
        self.blobs.delete(&file.object_key).await?;

        let mut tx = self.db.begin().await?;
        let size = FileRepository::delete_committed(&mut tx, file_id, owner_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("file".to_string()))?;
        QuotaManager::release(&mut tx, owner_id, size).await?;
        tx.commit().await?;

        info!(file_id, owner_id, size, "File deleted");
        Ok(())
    }

    /// Move a file to another folder (or root level with `None`).
    pub async fn move_file(
        &self,
        file_id: i64,
        owner_id: i64,
        target: Option<i64>,
    ) -> Result<FileRecord> {
        self.move_inner(file_id, owner_id, target)
            .await
            .map_err(|e| e.logged("file move"))
    }

    async fn move_inner(
        &self,
        file_id: i64,
        owner_id: i64,
        target: Option<i64>,
    ) -> Result<FileRecord> {
        self.owned_file(file_id, owner_id).await?;
        if let Some(folder_id) = target {
            self.require_folder(owner_id, folder_id).await?;
        }

        let repo = FileRepository::new(self.db.pool());
        if !repo.move_to(file_id, owner_id, target).await? {
            // The target folder or the file disappeared after the checks
            let what = if target.is_some() { "folder" } else { "file" };
            return Err(StrongboxError::NotFound(what.to_string()));
        }

        debug!(file_id, ?target, "File moved");
        repo.get_by_id(file_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("file".to_string()))
    }

    /// List committed files directly inside a folder (or root), newest first.
    pub async fn list(
        &self,
        owner_id: i64,
        folder_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<FileRecord>> {
        self.list_inner(owner_id, folder_id, page)
            .await
            .map_err(|e| e.logged("file list"))
    }

    async fn list_inner(
        &self,
        owner_id: i64,
        folder_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Page<FileRecord>> {
        page.validate()?;
        if let Some(folder_id) = folder_id {
            self.require_folder(owner_id, folder_id).await?;
        }

        let repo = FileRepository::new(self.db.pool());
        let items = repo
            .list_by_folder(owner_id, folder_id, page.offset(), page.limit())
            .await?;
        let total = repo.count_by_folder(owner_id, folder_id).await?;

        Ok(Page {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn owned_file(&self, file_id: i64, owner_id: i64) -> Result<FileRecord> {
        let file = FileRepository::new(self.db.pool())
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("file".to_string()))?;

        if file.owner_id != owner_id {
            return Err(StrongboxError::AccessDenied("file".to_string()));
        }
        Ok(file)
    }

    /// A container folder must exist and belong to the caller; anything
    /// else is reported as not found.
    async fn require_folder(&self, owner_id: i64, folder_id: i64) -> Result<()> {
        match FolderRepository::new(self.db.pool())
            .get_by_id(folder_id)
            .await?
        {
            Some(folder) if folder.owner_id == owner_id => Ok(()),
            _ => Err(StrongboxError::NotFound("folder".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::db::{NewUser, Tier, UserRepository};
    use crate::file::NewFolder;
    use crate::quota::MIB;

    struct Fixture {
        db: Database,
        blobs: MemoryBlobStore,
        keys: KeyDeriver,
        owner: i64,
        other: i64,
    }

    impl Fixture {
        async fn new() -> Self {
            let db = Database::open_in_memory().await.unwrap();
            let users = UserRepository::new(db.pool());
            let owner = users
                .create(&NewUser::new("alice", "alice@example.com"))
                .await
                .unwrap()
                .id;
            let other = users
                .create(&NewUser::new("bob", "bob@example.com").with_tier(Tier::Pro))
                .await
                .unwrap()
                .id;
            Self {
                db,
                blobs: MemoryBlobStore::new(),
                keys: KeyDeriver::new([7u8; 32]).unwrap(),
                owner,
                other,
            }
        }

        fn service(&self) -> FileService<'_> {
            FileService::new(&self.db, &self.blobs, &self.keys)
        }

        async fn used(&self, user_id: i64) -> u64 {
            UserRepository::new(self.db.pool())
                .require(user_id)
                .await
                .unwrap()
                .storage_used
        }
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let fx = Fixture::new().await;
        let service = fx.service();

        let record = service
            .upload(
                fx.owner,
                &UploadRequest::new("hello.txt", "text/plain", b"hello world".to_vec()),
            )
            .await
            .unwrap();

        assert_eq!(record.size, 11);
        assert_eq!(record.object_key, format!("{}/{}", fx.owner, record.id));
        assert!(!record.is_pending());
        assert_eq!(fx.used(fx.owner).await, 11);

        // Stored bytes are encrypted
        assert_ne!(fx.blobs.raw(&record.object_key).unwrap(), b"hello world");

        let download = service.download(record.id, fx.owner).await.unwrap();
        assert_eq!(download.content, b"hello world");
        assert_eq!(download.filename, "hello.txt");
        assert_eq!(download.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_upload_default_mime_type() {
        let fx = Fixture::new().await;
        let record = fx
            .service()
            .upload(fx.owner, &UploadRequest::new("blob", "", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(record.mime_type, "application/octet-stream");
        assert_eq!(
            fx.blobs.metadata(&record.object_key).unwrap().content_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_upload_validates_name() {
        let fx = Fixture::new().await;
        let result = fx
            .service()
            .upload(fx.owner, &UploadRequest::new("", "text/plain", vec![1]))
            .await;
        assert!(matches!(result, Err(StrongboxError::Validation(_))));
    }

    #[tokio::test]
    async fn test_upload_into_foreign_folder() {
        let fx = Fixture::new().await;
        let folder = FolderRepository::new(fx.db.pool())
            .create(&NewFolder::new(fx.other, "theirs"))
            .await
            .unwrap();

        let result = fx
            .service()
            .upload(
                fx.owner,
                &UploadRequest::new("a", "text/plain", vec![1]).in_folder(folder.id),
            )
            .await;
        assert!(matches!(result, Err(StrongboxError::NotFound(_))));
        assert!(fx.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_upload_over_quota_changes_nothing() {
        let fx = Fixture::new().await;
        let result = fx
            .service()
            .upload(
                fx.owner,
                &UploadRequest::new("big.bin", "", vec![0; (50 * MIB + 1) as usize]),
            )
            .await;

        assert!(matches!(result, Err(StrongboxError::QuotaExceeded { .. })));
        assert_eq!(fx.used(fx.owner).await, 0);
        assert!(fx.blobs.is_empty());
        assert_eq!(
            FileRepository::new(fx.db.pool())
                .count_by_folder(fx.owner, None)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_failed_blob_write_removes_pending_row() {
        let fx = Fixture::new().await;
        fx.blobs.set_fail_puts(true);

        let result = fx
            .service()
            .upload(fx.owner, &UploadRequest::new("a", "", vec![1, 2, 3]))
            .await;
        assert!(matches!(result, Err(StrongboxError::StorageUnavailable(_))));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(fx.used(fx.owner).await, 0);
    }

    #[tokio::test]
    async fn test_download_access_control() {
        let fx = Fixture::new().await;
        let service = fx.service();
        let record = service
            .upload(fx.owner, &UploadRequest::new("a", "", vec![1]))
            .await
            .unwrap();

        assert!(matches!(
            service.download(record.id, fx.other).await,
            Err(StrongboxError::AccessDenied(_))
        ));
        assert!(matches!(
            service.download(9999, fx.owner).await,
            Err(StrongboxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_with_rotated_master_key() {
        let fx = Fixture::new().await;
        let record = fx
            .service()
            .upload(fx.owner, &UploadRequest::new("a", "", b"secret".to_vec()))
            .await
            .unwrap();

        let rotated = KeyDeriver::new([8u8; 32]).unwrap();
        let result = FileService::new(&fx.db, &fx.blobs, &rotated)
            .download(record.id, fx.owner)
            .await;
        assert!(matches!(result, Err(StrongboxError::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_delete_releases_quota() {
        let fx = Fixture::new().await;
        let service = fx.service();
        let keep = service
            .upload(fx.owner, &UploadRequest::new("keep", "", vec![0; 100]))
            .await
            .unwrap();
        let gone = service
            .upload(fx.owner, &UploadRequest::new("gone", "", vec![0; 40]))
            .await
            .unwrap();
        assert_eq!(fx.used(fx.owner).await, 140);

        service.delete(gone.id, fx.owner).await.unwrap();
        assert_eq!(fx.used(fx.owner).await, 100);
        assert!(!fx.blobs.contains(&gone.object_key));
        assert!(fx.blobs.contains(&keep.object_key));

        assert!(matches!(
            service.delete(gone.id, fx.owner).await,
            Err(StrongboxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_blob_failure_aborts() {
        let fx = Fixture::new().await;
        let service = fx.service();
        let record = service
            .upload(fx.owner, &UploadRequest::new("a", "", vec![0; 10]))
            .await
            .unwrap();

        fx.blobs.set_fail_deletes(true);
        let result = service.delete(record.id, fx.owner).await;
        assert!(matches!(result, Err(StrongboxError::StorageUnavailable(_))));

        assert_eq!(fx.used(fx.owner).await, 10);
        assert!(service.get(record.id, fx.owner).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_by_other_user() {
        let fx = Fixture::new().await;
        let service = fx.service();
        let record = service
            .upload(fx.owner, &UploadRequest::new("a", "", vec![0; 10]))
            .await
            .unwrap();

        assert!(matches!(
            service.delete(record.id, fx.other).await,
            Err(StrongboxError::AccessDenied(_))
        ));
        assert!(fx.blobs.contains(&record.object_key));
    }

    #[tokio::test]
    async fn test_move_file() {
        let fx = Fixture::new().await;
        let service = fx.service();
        let folders = FolderRepository::new(fx.db.pool());
        let docs = folders
            .create(&NewFolder::new(fx.owner, "docs"))
            .await
            .unwrap();
        let theirs = folders
            .create(&NewFolder::new(fx.other, "theirs"))
            .await
            .unwrap();

        let record = service
            .upload(fx.owner, &UploadRequest::new("a", "", vec![1]))
            .await
            .unwrap();

        let moved = service
            .move_file(record.id, fx.owner, Some(docs.id))
            .await
            .unwrap();
        assert_eq!(moved.folder_id, Some(docs.id));

        assert!(matches!(
            service.move_file(record.id, fx.owner, Some(theirs.id)).await,
            Err(StrongboxError::NotFound(_))
        ));
        assert!(matches!(
            service.move_file(record.id, fx.other, None).await,
            Err(StrongboxError::AccessDenied(_))
        ));

        let back = service.move_file(record.id, fx.owner, None).await.unwrap();
        assert_eq!(back.folder_id, None);
    }

    #[tokio::test]
    async fn test_list_paging() {
        let fx = Fixture::new().await;
        let service = fx.service();

        for i in 0..5 {
            service
                .upload(fx.owner, &UploadRequest::new(format!("f{i}"), "", vec![1]))
                .await
                .unwrap();
        }
        service
            .upload(fx.other, &UploadRequest::new("other", "", vec![1]))
            .await
            .unwrap();

        let page = service
            .list(fx.owner, None, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "f4");
        assert!(page.has_more());

        let last = service
            .list(fx.owner, None, PageRequest::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "f0");

        assert!(matches!(
            service.list(fx.owner, None, PageRequest::new(0, 2)).await,
            Err(StrongboxError::Validation(_))
        ));
        assert!(matches!(
            service.list(fx.owner, None, PageRequest::new(1, 101)).await,
            Err(StrongboxError::Validation(_))
        ));
    }
}
