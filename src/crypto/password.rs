//! Password handling for volume encryption.

use zeroize::Zeroizing;

use super::secure::SecretBytes;

/// Minimum accepted password length in bytes.
///
/// Shorter entries are rejected at the prompt and re-asked; they never
/// reach key derivation.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A volume password.
///
/// The bytes live in locked memory (see [`SecretBytes`]) and are wiped
/// when the password is dropped. Equality is constant-time.
pub struct Password {
    inner: SecretBytes,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        let source = Zeroizing::new(password.into());
        Self {
            inner: SecretBytes::from_slice(source.as_bytes()),
        }
    }

    /// Returns the password bytes for key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_slice()
    }

    /// Returns the password length in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if the password meets [`MIN_PASSWORD_LEN`].
    pub fn is_acceptable(&self) -> bool {
        self.len() >= MIN_PASSWORD_LEN
    }

    /// Compares two passwords in constant time.
    pub fn ct_eq(&self, other: &Password) -> bool {
        constant_time_eq::constant_time_eq(self.as_bytes(), other.as_bytes())
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the password in debug output
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
