//! Cryptographic primitives for Strongbox.
//!
//! - HKDF-SHA256 per-file key derivation from a master secret
//! - Random salts and bearer tokens
//! - The AES-256-GCM envelope blob stores apply with a caller-supplied key

pub mod envelope;
mod keys;

pub use keys::{
    derive_file_key, generate_salt, generate_token, FileKey, KeyDeriver, FILE_KEY_LEN,
    MIN_MASTER_KEY_LEN,
};
