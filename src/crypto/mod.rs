//! Cryptographic core of the filter.
//!
//! This module owns key derivation, fingerprints and the per-block codec:
//!
//! - [`kdf`] turns a password and the 16-byte volume salt into the 64-byte
//!   session key (bcrypt cost 2^14, then SHA-512 over the textual hash).
//! - [`fingerprint`] creates and verifies `salt ‖ digest` tags proving key
//!   knowledge without storing the key.
//! - [`codec`] frames plaintext blocks as `iv ‖ ciphertext ‖ mac` with a
//!   deterministic chained IV and an encrypt-then-MAC construction.
//!
//! Key material lives in [`SecretBytes`]: locked against paging while held
//! and wiped on release.

pub mod codec;
pub mod fingerprint;
pub mod kdf;
mod password;
mod secure;

pub use codec::BlockCodec;
pub use password::{MIN_PASSWORD_LEN, Password};
pub use secure::SecretBytes;

/// Session key size in bytes. The first half keys the HMAC states, the
/// second half keys AES-256.
pub const KEY_SIZE: usize = 64;

/// Volume salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// Per-block IV size in bytes.
pub const IV_SIZE: usize = 16;

/// AES cipher block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Per-block MAC size: HMAC-SHA-512 output truncated to its first half.
pub const MAC_SIZE: usize = 32;

/// Plaintext framing unit on upload.
pub const FILTER_BLOCK_SIZE: usize = 16384;

/// Fingerprint size: `fp_salt(16) ‖ fp_digest(64)`.
pub const FINGERPRINT_SIZE: usize = SALT_SIZE + KEY_SIZE;

/// Width of the chained-IV accumulator (HMAC-SHA-1 output).
pub(crate) const IV_CHAIN_WIDTH: usize = 20;
