//! File metadata types and repository for Strongbox.
//!
//! A row with an empty `object_key` is a pending upload: its blob has not
//! been confirmed yet. Pending rows are invisible to every lookup and
//! listing here and are never counted toward quota.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::datetime::Timestamp;
use crate::db::{is_foreign_key_violation, sql_bytes};
use crate::{Result, StrongboxError};

const FILE_COLUMNS: &str = "id, name, size, mime_type, encryption_salt, object_key, folder_id, owner_id, created_at, updated_at";

/// Stored file metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileRecord {
    /// Unique file ID.
    pub id: i64,
    /// Display filename.
    pub name: String,
    /// Plaintext size in bytes.
    #[sqlx(try_from = "i64")]
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Base64 salt for per-file key derivation.
    #[serde(skip)]
    pub encryption_salt: String,
    /// Blob key (empty while pending).
    #[serde(skip)]
    pub object_key: String,
    /// Containing folder (None at root level).
    pub folder_id: Option<i64>,
    /// Owning user.
    pub owner_id: i64,
    /// Upload time.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
    /// Last metadata change.
    #[sqlx(try_from = "i64")]
    pub updated_at: Timestamp,
}

impl FileRecord {
    /// Whether the blob for this file has not been confirmed yet.
    pub fn is_pending(&self) -> bool {
        self.object_key.is_empty()
    }
}

/// Data for inserting a pending file row.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Display filename.
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Base64 salt.
    pub encryption_salt: String,
    /// Containing folder.
    pub folder_id: Option<i64>,
    /// Owning user.
    pub owner_id: i64,
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending row. Returns the new file ID.
    ///
    /// The insert only happens if the target folder (when given) still
    /// exists for the owner; otherwise the result is `NotFound`.
    pub async fn create_pending(&self, file: &NewFile) -> Result<i64> {
        let now = Timestamp::now().millis();
        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO files (name, size, mime_type, encryption_salt, object_key, folder_id, owner_id, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, '', ?5, ?6, ?7, ?8
             WHERE ?5 IS NULL
                OR EXISTS (SELECT 1 FROM folders WHERE id = ?5 AND owner_id = ?6)
             RETURNING id",
        )
        .bind(&file.name)
        .bind(sql_bytes(file.size)?)
        .bind(&file.mime_type)
        .bind(&file.encryption_salt)
        .bind(file.folder_id)
        .bind(file.owner_id)
        .bind(now)
        .bind(now)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StrongboxError::NotFound("user".to_string())
            } else {
                e.into()
            }
        })?;

        id.ok_or_else(|| StrongboxError::NotFound("folder".to_string()))
    }

    /// Get a committed file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND object_key != ''"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(file)
    }

    /// Get a file row by ID, pending or not.
    #[cfg(test)]
    pub async fn get_any(&self, id: i64) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(file)
    }

    /// List committed files directly inside a folder (or root), newest first.
    pub async fn list_by_folder(
        &self,
        owner_id: i64,
        folder_id: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE owner_id = ? AND COALESCE(folder_id, 0) = COALESCE(?, 0) AND object_key != ''
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(folder_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(files)
    }

    /// Count committed files directly inside a folder (or root).
    pub async fn count_by_folder(&self, owner_id: i64, folder_id: Option<i64>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files
             WHERE owner_id = ? AND COALESCE(folder_id, 0) = COALESCE(?, 0) AND object_key != ''",
        )
        .bind(owner_id)
        .bind(folder_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    /// Sum of committed file sizes for an owner.
    pub async fn total_size_by_owner(&self, owner_id: i64) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size), 0) FROM files WHERE owner_id = ? AND object_key != ''",
        )
        .bind(owner_id)
        .fetch_one(self.pool)
        .await?;

        Ok(total.max(0) as u64)
    }

    /// Delete a pending row. Returns true if one was removed.
    pub async fn delete_pending(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND object_key = ''")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Re-parent a committed file.
    ///
    /// The update only applies while the target folder exists and belongs
    /// to the same owner. Returns true if the row was moved.
    pub async fn move_to(&self, id: i64, owner_id: i64, target: Option<i64>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET folder_id = ?, updated_at = ?
             WHERE id = ? AND owner_id = ? AND object_key != ''
               AND (? IS NULL OR EXISTS (SELECT 1 FROM folders WHERE id = ? AND owner_id = ?))",
        )
        .bind(target)
        .bind(Timestamp::now().millis())
        .bind(id)
        .bind(owner_id)
        .bind(target)
        .bind(target)
        .bind(owner_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a pending row as stored. Returns false if the row is gone or
    /// already committed.
    pub async fn commit(conn: &mut SqliteConnection, id: i64, object_key: &str) -> Result<bool> {
        if object_key.is_empty() {
            return Err(StrongboxError::Validation(
                "object key must not be empty".to_string(),
            ));
        }

        let result = sqlx::query(
            "UPDATE files SET object_key = ?, updated_at = ? WHERE id = ? AND object_key = ''",
        )
        .bind(object_key)
        .bind(Timestamp::now().millis())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a committed file row. Returns its size if a row was removed.
    pub async fn delete_committed(
        conn: &mut SqliteConnection,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<u64>> {
        let size: Option<i64> = sqlx::query_scalar(
            "DELETE FROM files WHERE id = ? AND owner_id = ? AND object_key != '' RETURNING size",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(size.map(|s| s.max(0) as u64))
    }
}
