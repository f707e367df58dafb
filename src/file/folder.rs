//! Folder types and repository for Strongbox.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool};

use crate::datetime::Timestamp;
use crate::db::is_unique_violation;
use crate::{Result, StrongboxError};

const FOLDER_COLUMNS: &str = "id, name, parent_id, owner_id, created_at, updated_at";

/// Maximum number of bound ids per `IN (...)` query.
const ID_CHUNK: usize = 500;

/// A folder in a user's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None at root level).
    pub parent_id: Option<i64>,
    /// Owning user.
    pub owner_id: i64,
    /// When the folder was created.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
    /// When the folder was last renamed.
    #[sqlx(try_from = "i64")]
    pub updated_at: Timestamp,
}

/// A folder listing entry with child counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FolderSummary {
    /// Folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder ID.
    pub parent_id: Option<i64>,
    /// When the folder was created.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
    /// Committed files directly inside.
    pub file_count: i64,
    /// Direct subfolders.
    pub folder_count: i64,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root level).
    pub parent_id: Option<i64>,
    /// Owning user.
    pub owner_id: i64,
}

impl NewFolder {
    /// Create a new root-level folder for `owner_id`.
    pub fn new(owner_id: i64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            owner_id,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = parent_id;
        self
    }
}

/// A committed file found while walking a subtree.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SubtreeFile {
    /// File ID.
    pub id: i64,
    /// Blob key.
    pub object_key: String,
    /// Size in bytes.
    #[sqlx(try_from = "i64")]
    pub size: u64,
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    ///
    /// A sibling with the same name fails with `DuplicateName`.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let now = Timestamp::now().millis();
        let result = sqlx::query(
            "INSERT INTO folders (name, parent_id, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&folder.name)
        .bind(folder.parent_id)
        .bind(folder.owner_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| duplicate_or(e, &folder.name))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(folder)
    }

    /// Whether `owner_id` has a folder named `name` under `parent_id`,
    /// ignoring the folder `exclude`.
    pub async fn name_taken(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM folders
                WHERE owner_id = ? AND COALESCE(parent_id, 0) = COALESCE(?, 0) AND name = ?
                  AND id != COALESCE(?, 0)
            )",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    /// Rename a folder. Returns None if it doesn't exist.
    pub async fn rename(&self, id: i64, name: &str) -> Result<Option<Folder>> {
        let result = sqlx::query("UPDATE folders SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Timestamp::now().millis())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| duplicate_or(e, name))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// List direct children of `parent_id` for an owner, by name.
    pub async fn list_children(
        &self,
        owner_id: i64,
        parent_id: Option<i64>,
    ) -> Result<Vec<FolderSummary>> {
        let folders = sqlx::query_as::<_, FolderSummary>(
            "SELECT f.id, f.name, f.parent_id, f.created_at,
                    (SELECT COUNT(*) FROM files
                     WHERE files.folder_id = f.id AND files.object_key != '') AS file_count,
                    (SELECT COUNT(*) FROM folders c WHERE c.parent_id = f.id) AS folder_count
             FROM folders f
             WHERE f.owner_id = ? AND COALESCE(f.parent_id, 0) = COALESCE(?, 0)
             ORDER BY f.name ASC, f.id ASC",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        Ok(folders)
    }

    /// Collect `root_id` and every descendant folder ID.
    ///
    /// Walks the tree depth-first with an explicit stack, so depth is
    /// bounded only by memory. The root comes first and every folder
    /// precedes its descendants.
    pub async fn collect_subtree(conn: &mut SqliteConnection, root_id: i64) -> Result<Vec<i64>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root_id];

        while let Some(folder_id) = stack.pop() {
            if !seen.insert(folder_id) {
                continue;
            }
            order.push(folder_id);

            let children: Vec<i64> = sqlx::query_scalar("SELECT id FROM folders WHERE parent_id = ?")
                .bind(folder_id)
                .fetch_all(&mut *conn)
                .await?;
            stack.extend(children);
        }

        Ok(order)
    }

    /// Committed files directly inside any of `folder_ids`.
    pub async fn committed_files_in(
        conn: &mut SqliteConnection,
        folder_ids: &[i64],
    ) -> Result<Vec<SubtreeFile>> {
        let mut files = Vec::new();

        for chunk in folder_ids.chunks(ID_CHUNK) {
            let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "SELECT id, object_key, size FROM files WHERE object_key != '' AND folder_id IN (",
            );
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows = query
                .build_query_as::<SubtreeFile>()
                .fetch_all(&mut *conn)
                .await?;
            files.extend(rows);
        }

        Ok(files)
    }

    /// Bump `updated_at` on a folder owned by `owner_id`.
    ///
    /// Used as the first statement of a write transaction so the write lock
    /// is taken before the subtree is read. Returns false if no such folder.
    pub async fn touch(conn: &mut SqliteConnection, id: i64, owner_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET updated_at = ? WHERE id = ? AND owner_id = ?")
            .bind(Timestamp::now().millis())
            .bind(id)
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a folder owned by `owner_id`; descendants and their file rows
    /// cascade. Returns true if a folder was deleted.
    pub async fn delete(conn: &mut SqliteConnection, id: i64, owner_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn duplicate_or(e: sqlx::Error, name: &str) -> StrongboxError {
    if is_unique_violation(&e) {
        StrongboxError::DuplicateName(name.to_string())
    } else {
        e.into()
    }
}
