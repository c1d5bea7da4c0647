//! Host-provided services.
//!
//! The filter runs inside a storage client that supplies a volume-scoped
//! metadata store and an interactive secret prompt. Both are consumed
//! through traits so the session logic stays independent of the host and
//! tests can script them. Logging goes through the `log` facade; every
//! message carries the `aes256:` prefix the host expects.

use std::collections::HashMap;

use crate::crypto::Password;
use crate::{Error, Result};

/// Volume-scoped key/value store.
///
/// The filter uses a single entry, `aes256_fp`, to publish the volume
/// fingerprint so that other clients of the same volume can verify
/// passwords and detect password changes.
pub trait MetaStore {
    /// Fetches the value for `key`, if present.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &[u8]);
}

impl MetaStore for HashMap<String, Vec<u8>> {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: &[u8]) {
        self.insert(key.to_owned(), value.to_vec());
    }
}

/// Interactive entry of sensitive strings.
///
/// Implementations must not echo the entry. Returning an error means the
/// user aborted or the prompt channel is unavailable; the session setup
/// propagates that as [`Error::Prompt`] (or [`Error::BadPassword`] when a
/// fingerprint mismatch already occurred).
pub trait PasswordPrompt {
    /// Prompts with `label` and returns the entered password.
    fn prompt(&mut self, label: &str) -> Result<Password>;
}

/// Prompt backed by the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt(&mut self, label: &str) -> Result<Password> {
        rpassword::prompt_password(label)
            .map(Password::new)
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_meta_store() {
        let mut meta: HashMap<String, Vec<u8>> = HashMap::new();
        assert!(MetaStore::get(&meta, "aes256_fp").is_none());

        meta.set("aes256_fp", &[1, 2, 3]);
        assert_eq!(MetaStore::get(&meta, "aes256_fp"), Some(vec![1, 2, 3]));

        meta.set("aes256_fp", &[4, 5]);
        assert_eq!(MetaStore::get(&meta, "aes256_fp"), Some(vec![4, 5]));
    }
}
