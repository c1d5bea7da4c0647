//! Error types for the encryption filter.
//!
//! All fallible operations in this crate return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Setup failures (bad volume
//! configuration, key derivation, fingerprint mismatch) surface from
//! `data_prepare`; per-block cipher failures surface from `data_process`
//! and latch the session so that further processing is refused.
//!
//! Key-cache I/O failures are deliberately *not* part of this taxonomy:
//! they degrade to "no cache" with a warning, per the filter contract.

use std::io;

/// The main error type for filter operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The volume configuration bytes have an unrecognized layout.
    ///
    /// Valid lengths are 16 (paranoid: salt only), 17 (nogenkey: salt plus
    /// marker) and 96 (normal: salt plus fingerprint).
    #[error("invalid volume configuration: {0}")]
    BadConfig(String),

    /// The underlying password hash failed.
    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    /// The derived key does not match the volume fingerprint.
    #[error("invalid password for this volume")]
    BadPassword,

    /// A block's HMAC did not verify during decryption.
    ///
    /// Either the ciphertext was corrupted in transit or it was produced
    /// with a different key. The session is terminal once this is returned.
    #[error("block authentication failed")]
    AuthFailed,

    /// AES finalisation failed (bad padding or a truncated block).
    ///
    /// The session is terminal once this is returned.
    #[error("block decryption failed")]
    DecryptFailed,

    /// The operating system entropy source failed.
    #[error("random generation failed: {0}")]
    RngFailed(String),

    /// Password entry was aborted or the prompt channel failed.
    #[error("password entry failed: {0}")]
    Prompt(String),

    /// An internal cipher or MAC state could not be constructed.
    ///
    /// This indicates a programming error (wrong key or IV width reaching
    /// the primitives) and should not occur in normal operation.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// An I/O error outside the best-effort cache paths.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` if this error indicates corrupted or foreign
    /// ciphertext encountered mid-stream.
    ///
    /// These errors latch the session: every subsequent `process` call
    /// fails until the host tears the session down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::AuthFailed | Error::DecryptFailed)
    }

    /// Returns `true` if retrying with different user input could succeed.
    ///
    /// A fingerprint mismatch or an aborted prompt can be resolved by the
    /// user; corrupted ciphertext cannot.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BadPassword | Error::Prompt(_))
    }
}

/// A specialized Result type for filter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(Error::AuthFailed.is_terminal());
        assert!(Error::DecryptFailed.is_terminal());
        assert!(!Error::BadPassword.is_terminal());
        assert!(!Error::BadConfig("x".into()).is_terminal());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::BadPassword.is_recoverable());
        assert!(Error::Prompt("aborted".into()).is_recoverable());
        assert!(!Error::AuthFailed.is_recoverable());
        assert!(!Error::KdfFailed("x".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::BadConfig("length 20".into()).to_string(),
            "invalid volume configuration: length 20"
        );
        assert_eq!(
            Error::BadPassword.to_string(),
            "invalid password for this volume"
        );
        assert!(Error::AuthFailed.to_string().contains("authentication"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
