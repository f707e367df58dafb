//! Application wiring.
//!
//! `Application` owns the stores built from `Config` and hands out
//! services configured from it.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionAuthenticator;
use crate::blob::{BlobStore, LocalBlobStore};
use crate::config::Config;
use crate::crypto::KeyDeriver;
use crate::db::Database;
use crate::file::{FileService, FolderService};
use crate::share::ShareService;
use crate::subscription::SubscriptionService;
use crate::Result;

/// Stores and settings shared by every service.
#[derive(Clone)]
pub struct Application {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    keys: Arc<KeyDeriver>,
    config: Arc<Config>,
}

impl Application {
    /// Create an application from already opened stores.
    pub fn new(
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        keys: Arc<KeyDeriver>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            blobs,
            keys,
            config,
        }
    }

    /// Validate `config` and open the metadata database, the local blob
    /// store and the key deriver it describes.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::open(&config.database.path, config.database.max_connections).await?;
        let blobs = LocalBlobStore::new(
            &config.storage.root,
            &config.storage.public_base_url,
            &config.storage.presign_secret,
        )?;
        let keys = KeyDeriver::new(&config.security.master_key)?;

        Ok(Self::new(
            Arc::new(db),
            Arc::new(blobs),
            Arc::new(keys),
            Arc::new(config),
        ))
    }

    /// Get the database.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Get the blob store.
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Get the configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Lifetime of presigned URLs handed out for shares.
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.config.storage.presigned_url_ttl_secs)
    }

    /// File operations.
    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, self.blobs.as_ref(), &self.keys)
    }

    /// Folder operations.
    pub fn folders(&self) -> FolderService<'_> {
        FolderService::new(&self.db, self.blobs.as_ref())
    }

    /// Share operations, presigning with the configured TTL.
    pub fn shares(&self) -> ShareService<'_> {
        ShareService::new(&self.db, self.blobs.as_ref(), &self.config.shares)
            .with_presign_ttl(self.presign_ttl())
    }

    /// Tier and usage operations.
    pub fn subscriptions(&self) -> SubscriptionService<'_> {
        SubscriptionService::new(&self.db)
    }

    /// Session tokens with the configured lifetime.
    pub fn sessions(&self) -> SessionAuthenticator {
        SessionAuthenticator::new(self.db.as_ref().clone())
            .with_expiry_hours(self.config.security.session_expiry_hours)
    }
}
