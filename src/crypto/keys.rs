//! Per-file key derivation and random token generation.

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::{Result, StrongboxError};

/// Minimum length of the master secret in bytes.
pub const MIN_MASTER_KEY_LEN: usize = 32;

/// Length of a derived file key in bytes.
pub const FILE_KEY_LEN: usize = 32;

const SALT_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// Symmetric key for a single stored object.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey([u8; FILE_KEY_LEN]);

impl FileKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; FILE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; FILE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

/// HKDF info string for a file. Embeds the file id so two files never
/// share a key even if a salt is reused.
fn file_info(file_id: i64) -> String {
    format!("strongbox-file-{file_id}")
}

/// Derive a file key with HKDF-SHA256.
///
/// `salt` is the raw (decoded) per-file salt.
pub fn derive_file_key(master_secret: &[u8], salt: &[u8], file_id: i64) -> Result<FileKey> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_secret);
    let mut okm = [0u8; FILE_KEY_LEN];
    hk.expand(file_info(file_id).as_bytes(), &mut okm)
        .map_err(|e| StrongboxError::DecryptionFailed(format!("key expansion failed: {e}")))?;
    Ok(FileKey(okm))
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a fresh per-file salt (32 random bytes, standard base64).
pub fn generate_salt() -> String {
    STANDARD.encode(random_bytes::<SALT_LEN>())
}

/// Generate an unguessable bearer token (32 random bytes, URL-safe base64).
///
/// Used for both share tokens and session tokens.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<TOKEN_LEN>())
}

/// Holds the master secret and derives per-file keys from it.
#[derive(Clone)]
pub struct KeyDeriver {
    master: Vec<u8>,
}

impl KeyDeriver {
    /// Create a deriver. Fails if the master secret is too short.
    pub fn new(master_secret: impl AsRef<[u8]>) -> Result<Self> {
        let master = master_secret.as_ref();
        if master.len() < MIN_MASTER_KEY_LEN {
            return Err(StrongboxError::Config(format!(
                "master secret must be at least {MIN_MASTER_KEY_LEN} bytes"
            )));
        }
        Ok(Self {
            master: master.to_vec(),
        })
    }

    /// Derive the key for a file from its stored base64 salt.
    pub fn derive_file_key(&self, salt_b64: &str, file_id: i64) -> Result<FileKey> {
        let salt = STANDARD.decode(salt_b64).map_err(|e| {
            StrongboxError::DecryptionFailed(format!("stored salt for file {file_id} is corrupt: {e}"))
        })?;
        derive_file_key(&self.master, &salt, file_id)
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDeriver").finish_non_exhaustive()
    }
}
