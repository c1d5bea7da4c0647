//! Password-based key derivation.
//!
//! The volume key is derived in two steps: bcrypt over the password with
//! the 16-byte volume salt (cost factor 2^14), then SHA-512 over the full
//! textual bcrypt result. The 64-byte digest is the session key.
//!
//! Hashing the whole textual result (setting, salt and digest fields) keeps
//! the visible salt portion of the hash string from ever feeding the key
//! directly.

use bcrypt::Version;
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use super::password::Password;
use super::secure::SecretBytes;
use super::{KEY_SIZE, SALT_SIZE};
use crate::{Error, Result};

/// bcrypt cost factor; iteration count is 2^14.
pub const BCRYPT_COST: u32 = 14;

/// Derives the 64-byte volume key from a password and salt.
///
/// # Errors
///
/// Returns [`Error::KdfFailed`] if the underlying password hash fails.
pub fn derive_key(password: &Password, salt: &[u8; SALT_SIZE]) -> Result<SecretBytes> {
    let parts = bcrypt::hash_with_salt(password.as_bytes(), BCRYPT_COST, *salt)
        .map_err(|e| Error::KdfFailed(e.to_string()))?;
    let textual = Zeroizing::new(parts.format_for_version(Version::TwoB));

    let digest = Sha512::digest(textual.as_bytes());
    debug_assert_eq!(digest.len(), KEY_SIZE);
    Ok(SecretBytes::from_slice(&digest))
}
