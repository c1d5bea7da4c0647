//! Volume key fingerprints.
//!
//! A fingerprint proves that a candidate key matches the one originally
//! used for a volume without storing the key anywhere: it is the key
//! derivation of §kdf applied to the hex form of `SHA-256(key)` under a
//! fingerprint-specific salt. The salt is sampled fresh when a fingerprint
//! is first created and is independent of the volume salt.
//!
//! Layout: `fp_salt(16) ‖ fp_digest(64)`.

use constant_time_eq::constant_time_eq;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use super::kdf;
use super::password::Password;
use super::secure::SecretBytes;
use super::{FINGERPRINT_SIZE, SALT_SIZE};
use crate::{Error, Result};

/// Creates a fingerprint for `key` with a freshly sampled salt.
///
/// # Errors
///
/// Returns [`Error::RngFailed`] if the OS entropy source fails, or
/// [`Error::KdfFailed`] if the digest derivation fails.
pub fn create(key: &SecretBytes) -> Result<[u8; FINGERPRINT_SIZE]> {
    let mut fp_salt = [0u8; SALT_SIZE];
    OsRng
        .try_fill_bytes(&mut fp_salt)
        .map_err(|e| Error::RngFailed(e.to_string()))?;
    create_with_salt(key, &fp_salt)
}

/// Creates a fingerprint for `key` under a caller-chosen salt.
pub fn create_with_salt(
    key: &SecretBytes,
    fp_salt: &[u8; SALT_SIZE],
) -> Result<[u8; FINGERPRINT_SIZE]> {
    let digest = derive_digest(key, fp_salt)?;

    let mut fp = [0u8; FINGERPRINT_SIZE];
    fp[..SALT_SIZE].copy_from_slice(fp_salt);
    fp[SALT_SIZE..].copy_from_slice(digest.as_slice());
    Ok(fp)
}

/// Verifies that `key` matches the fingerprint `fp`.
///
/// # Errors
///
/// Returns [`Error::BadPassword`] if the recomputed digest differs, or
/// [`Error::BadConfig`] if `fp` is not exactly [`FINGERPRINT_SIZE`] bytes.
pub fn verify(key: &SecretBytes, fp: &[u8]) -> Result<()> {
    if fp.len() != FINGERPRINT_SIZE {
        return Err(Error::BadConfig(format!(
            "fingerprint length {} (expected {})",
            fp.len(),
            FINGERPRINT_SIZE
        )));
    }

    let (fp_salt, expected) = fp.split_at(SALT_SIZE);
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(fp_salt);

    let digest = derive_digest(key, &salt)?;
    if !constant_time_eq(digest.as_slice(), expected) {
        return Err(Error::BadPassword);
    }
    Ok(())
}

/// Runs the key derivation over the hex form of `SHA-256(key)`.
fn derive_digest(key: &SecretBytes, fp_salt: &[u8; SALT_SIZE]) -> Result<SecretBytes> {
    let key_hash = Sha256::digest(key.as_slice());
    let preimage = Password::new(hex::encode(key_hash));
    kdf::derive_key(&preimage, fp_salt)
}
