//! Error types for Strongbox.

use thiserror::Error;

/// Common error type for Strongbox.
#[derive(Error, Debug)]
pub enum StrongboxError {
    /// Resource not found (or not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// The resource exists but belongs to another user.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Accepting the upload would push the user past the tier limit.
    #[error("storage quota exceeded: {used} + {incoming} bytes exceeds limit of {limit} bytes")]
    QuotaExceeded {
        /// Bytes currently in use.
        used: u64,
        /// Bytes the caller tried to add.
        incoming: u64,
        /// Tier limit in bytes.
        limit: u64,
    },

    /// A sibling with the same name already exists.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Share link is past its expiry.
    #[error("share link has expired")]
    Expired,

    /// Share link download limit has been reached.
    #[error("download limit reached for this share link")]
    LimitReached,

    /// Blob store or metadata store I/O failure.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Stored data could not be opened with the derived key.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Tier change rejected because current usage exceeds the new limit.
    #[error("invalid tier transition: usage of {used} bytes exceeds new limit of {limit} bytes")]
    InvalidTierTransition {
        /// Bytes currently in use.
        used: u64,
        /// Limit of the requested tier.
        limit: u64,
    },

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrongboxError {
    /// Whether this error is an expected outcome of caller input.
    ///
    /// Expected outcomes are returned to the caller and never logged as
    /// failures. Everything else is an unexpected failure of the
    /// underlying stores or of data integrity.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            StrongboxError::StorageUnavailable(_)
                | StrongboxError::DecryptionFailed(_)
                | StrongboxError::Config(_)
                | StrongboxError::Io(_)
        )
    }

    /// Log this error at `error!` if it is unexpected, then return it.
    ///
    /// Service entry points pass every error through here so failures of
    /// the stores are logged once with the operation name.
    pub fn logged(self, operation: &str) -> Self {
        if !self.is_expected() {
            tracing::error!(operation, error = %self, "operation failed");
        }
        self
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for StrongboxError {
    fn from(e: sqlx::Error) -> Self {
        StrongboxError::StorageUnavailable(format!("metadata store: {e}"))
    }
}

/// Result type alias for Strongbox operations.
pub type Result<T> = std::result::Result<T, StrongboxError>;
