//! Strongbox - multi-tenant encrypted file storage
//!
//! Users keep files in per-user folder hierarchies, bounded by a tier
//! quota. Every file is encrypted under its own derived key, and owners
//! can hand out expiring, download-limited share links.

pub mod app;
pub mod auth;
pub mod blob;
pub mod config;
pub mod crypto;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod quota;
pub mod share;
pub mod subscription;

pub use app::Application;
pub use auth::{Authenticator, ChallengeCache, SessionAuthenticator};
pub use blob::{BlobMetadata, BlobStore, LocalBlobStore, MemoryBlobStore};
pub use config::Config;
pub use crypto::{FileKey, KeyDeriver};
pub use datetime::Timestamp;
pub use db::{Database, NewUser, Tier, User, UserRepository};
pub use error::{Result, StrongboxError};
pub use file::{
    Download, FileRecord, FileService, Folder, FolderDeletion, FolderService, FolderSummary, Page,
    PageRequest, UploadRequest,
};
pub use quota::{QuotaManager, UsageReport};
pub use share::{Share, ShareAccess, ShareInfo, ShareService, ShareSummary};
pub use subscription::{SubscriptionChange, SubscriptionService, TierInfo};
