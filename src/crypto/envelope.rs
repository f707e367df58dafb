//! AES-256-GCM envelope applied by blob stores with a caller-supplied key.
//!
//! Layout: `nonce (12 bytes) || ciphertext || tag`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use super::FileKey;
use crate::{Result, StrongboxError};

const NONCE_LEN: usize = 12;

fn cipher(key: &FileKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StrongboxError::DecryptionFailed(format!("invalid key: {e}")))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StrongboxError::StorageUnavailable(format!("encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt an envelope produced by [`seal`].
///
/// Fails with `DecryptionFailed` on a wrong key or tampered data.
pub fn open(key: &FileKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(StrongboxError::DecryptionFailed(
            "envelope too short".to_string(),
        ));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StrongboxError::DecryptionFailed("authentication tag mismatch".to_string()))
}
