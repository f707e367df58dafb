//! File management module for Strongbox.
//!
//! This module provides encrypted file storage including:
//! - Per-user hierarchical folders
//! - File metadata with a pending/committed upload state
//! - Upload, download, move and delete with quota accounting
//! - Recursive folder deletion

mod folder;
mod folder_service;
mod metadata;
mod service;

pub use folder::{Folder, FolderRepository, FolderSummary, NewFolder, SubtreeFile};
pub use folder_service::{FolderDeletion, FolderService};
pub use metadata::{FileRecord, FileRepository, NewFile};
pub use service::{Download, FileService, UploadRequest};

use serde::Serialize;

use crate::{Result, StrongboxError};

/// Maximum length for file and folder names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Default page size for file listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a listing accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Check a file or folder name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StrongboxError::Validation(
            "name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(StrongboxError::Validation(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(StrongboxError::Validation(
            "name must not contain '/' or NUL".to_string(),
        ));
    }
    Ok(())
}

/// Page selection for listings. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Create a page request.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Check bounds: `page >= 1`, `1 <= page_size <= 100`.
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(StrongboxError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(StrongboxError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Number of items to skip.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Maximum number of items to return.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total number of items (across all pages).
    pub total: u64,
    /// Page number.
    pub page: u32,
    /// Page size used for this query.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` items.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    /// Check if there are more items after this page.
    pub fn has_more(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}
