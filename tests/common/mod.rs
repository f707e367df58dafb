//! Shared helpers for Strongbox integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use strongbox::config::SharesConfig;
use strongbox::db::{NewUser, Tier, UserRepository};
use strongbox::{Database, KeyDeriver, MemoryBlobStore};

/// Master secret used by every test deriver.
pub const MASTER_KEY: [u8; 32] = [42; 32];

/// Everything a service needs, owned so it can be shared across tasks.
pub struct TestEnv {
    pub db: Arc<Database>,
    pub blobs: Arc<MemoryBlobStore>,
    pub keys: Arc<KeyDeriver>,
    pub shares: Arc<SharesConfig>,
    /// Keeps a file-backed database alive.
    _dir: Option<TempDir>,
}

impl TestEnv {
    /// Environment backed by an in-memory database.
    pub async fn in_memory() -> Self {
        let db = Database::open_in_memory().await.unwrap();
        Self::with_db(db, None)
    }

    /// Environment backed by a WAL database file with several connections.
    pub async fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("strongbox.db"), 8)
            .await
            .unwrap();
        Self::with_db(db, Some(dir))
    }

    fn with_db(db: Database, dir: Option<TempDir>) -> Self {
        Self {
            db: Arc::new(db),
            blobs: Arc::new(MemoryBlobStore::new()),
            keys: Arc::new(KeyDeriver::new(MASTER_KEY).unwrap()),
            shares: Arc::new(SharesConfig::default()),
            _dir: dir,
        }
    }

    /// Create a user and return the user ID.
    pub async fn create_user(&self, username: &str, tier: Tier) -> i64 {
        UserRepository::new(self.db.pool())
            .create(&NewUser::new(username, format!("{username}@example.com")).with_tier(tier))
            .await
            .unwrap()
            .id
    }

    /// Overwrite a user's recorded usage (simulates files stored earlier).
    pub async fn set_usage(&self, user_id: i64, bytes: u64) {
        sqlx::query("UPDATE users SET storage_used = ? WHERE id = ?")
            .bind(bytes as i64)
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .unwrap();
    }

    /// Recorded usage for a user.
    pub async fn usage(&self, user_id: i64) -> u64 {
        UserRepository::new(self.db.pool())
            .get_by_id(user_id)
            .await
            .unwrap()
            .unwrap()
            .storage_used
    }

    /// Sum of committed file sizes for a user.
    pub async fn committed_bytes(&self, user_id: i64) -> u64 {
        strongbox::file::FileRepository::new(self.db.pool())
            .total_size_by_owner(user_id)
            .await
            .unwrap()
    }

    /// Number of file rows, pending or committed.
    pub async fn file_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}
