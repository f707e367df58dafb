//! Share links for Strongbox.
//!
//! A share is an unguessable bearer token granting time- and
//! count-limited access to one file without the owner's session.

mod repository;
mod service;

pub use repository::{NewShare, Share, ShareDetails, ShareRepository};
pub use service::{ShareAccess, ShareInfo, ShareService, ShareSummary, DEFAULT_PRESIGN_TTL};
