//! Volume-creation configuration.
//!
//! When a volume is created with this filter, the creation layer parses
//! the filter options and stores a small configuration blob with the
//! volume. Its length alone selects the key-establishment behaviour of
//! every later session:
//!
//! | Option | Stored bytes | Length |
//! |---|---|---|
//! | (default) | `salt ‖ fingerprint` | 96 |
//! | `nogenkey` | `salt ‖ marker` | 17 |
//! | `paranoid` | `salt` | 16 |
//!
//! `salt:HEX` (32 hex characters) forces a specific salt in any mode.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::crypto::{SALT_SIZE, fingerprint, kdf};
use crate::host::{MetaStore, PasswordPrompt};
use crate::session;
use crate::{Error, Result};

/// Marker byte appended to the salt in nogenkey mode. Only the resulting
/// 17-byte length is significant to readers.
const NOGENKEY_MARKER: u8 = 0x01;

/// Key-establishment policy selected at volume creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Salt and fingerprint in the volume config; key cached locally.
    #[default]
    Default,
    /// No fingerprint in the volume config; fingerprints live only in
    /// custom-meta.
    NoGenKey,
    /// Salt only; no local cache, no fingerprint, prompt every session.
    Paranoid,
}

/// Parsed volume-creation options for this filter.
#[derive(Debug, Clone, Default)]
pub struct VolumeOptions {
    policy: KeyPolicy,
    salt: Option<[u8; SALT_SIZE]>,
}

impl VolumeOptions {
    /// Parses a comma-separated option string, e.g. `"paranoid"` or
    /// `"nogenkey,salt:000102…"`. An empty string selects the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadConfig`] on unknown options, a malformed salt,
    /// or conflicting policies.
    pub fn parse(options: &str) -> Result<Self> {
        let mut parsed = Self::default();
        let mut policy = None;

        for token in options.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(hex_salt) = token.strip_prefix("salt:") {
                parsed.salt = Some(parse_salt(hex_salt)?);
            } else {
                let selected = match token {
                    "nogenkey" => KeyPolicy::NoGenKey,
                    "paranoid" => KeyPolicy::Paranoid,
                    other => {
                        return Err(Error::BadConfig(format!("unknown filter option '{other}'")));
                    }
                };
                if let Some(previous) = policy {
                    if previous != selected {
                        return Err(Error::BadConfig(
                            "'nogenkey' and 'paranoid' are mutually exclusive".into(),
                        ));
                    }
                }
                policy = Some(selected);
            }
        }

        parsed.policy = policy.unwrap_or_default();
        Ok(parsed)
    }

    /// Returns the selected key policy.
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Returns the forced salt, if `salt:HEX` was given.
    pub fn salt(&self) -> Option<&[u8; SALT_SIZE]> {
        self.salt.as_ref()
    }

    /// Builds the configuration bytes stored with the volume.
    ///
    /// In the default policy this prompts for (and confirms) the volume
    /// password, derives the key and embeds a fresh fingerprint; the same
    /// fingerprint entry is published to `meta`. The other policies store
    /// only the salt (plus the nogenkey marker).
    ///
    /// # Errors
    ///
    /// Returns [`Error::RngFailed`] if salt generation fails, or any
    /// prompt/derivation error from the default policy.
    pub fn build_config(
        &self,
        meta: &mut dyn MetaStore,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<Vec<u8>> {
        let salt = match self.salt {
            Some(salt) => salt,
            None => {
                let mut salt = [0u8; SALT_SIZE];
                OsRng
                    .try_fill_bytes(&mut salt)
                    .map_err(|e| Error::RngFailed(e.to_string()))?;
                salt
            }
        };

        match self.policy {
            KeyPolicy::Paranoid => Ok(salt.to_vec()),
            KeyPolicy::NoGenKey => {
                let mut cfg = salt.to_vec();
                cfg.push(NOGENKEY_MARKER);
                Ok(cfg)
            }
            KeyPolicy::Default => {
                let password = confirm_password(prompt)?;
                let key = kdf::derive_key(&password, &salt)?;
                let fp = fingerprint::create(&key)?;

                let mut cfg = salt.to_vec();
                cfg.extend_from_slice(&fp);
                meta.set(session::META_FINGERPRINT_KEY, &cfg);
                Ok(cfg)
            }
        }
    }
}

fn parse_salt(hex_salt: &str) -> Result<[u8; SALT_SIZE]> {
    let bytes = hex::decode(hex_salt)
        .map_err(|e| Error::BadConfig(format!("malformed salt override: {e}")))?;
    <[u8; SALT_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        Error::BadConfig(format!(
            "salt override must be {} hex characters",
            2 * SALT_SIZE
        ))
    })
}

fn confirm_password(prompt: &mut dyn PasswordPrompt) -> Result<crate::crypto::Password> {
    loop {
        let password = prompt.prompt("aes256: enter encryption password: ")?;
        if !password.is_acceptable() {
            log::warn!(
                "aes256: password must be at least {} characters",
                crate::crypto::MIN_PASSWORD_LEN
            );
            continue;
        }
        let again = prompt.prompt("aes256: re-enter encryption password: ")?;
        if !password.ct_eq(&again) {
            log::warn!("aes256: passwords do not match");
            continue;
        }
        return Ok(password);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_defaults() {
        let options = VolumeOptions::parse("").unwrap();
        assert_eq!(options.policy(), KeyPolicy::Default);
        assert!(options.salt().is_none());
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!(
            VolumeOptions::parse("nogenkey").unwrap().policy(),
            KeyPolicy::NoGenKey
        );
        assert_eq!(
            VolumeOptions::parse("paranoid").unwrap().policy(),
            KeyPolicy::Paranoid
        );
    }

    #[test]
    fn test_parse_salt_override() {
        let options = VolumeOptions::parse("salt:000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(
            options.salt(),
            Some(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
        );
    }

    #[test]
    fn test_parse_rejects_bad_salt() {
        assert!(VolumeOptions::parse("salt:zz").is_err());
        assert!(VolumeOptions::parse("salt:0011").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_and_conflicts() {
        assert!(VolumeOptions::parse("frobnicate").is_err());
        assert!(VolumeOptions::parse("nogenkey,paranoid").is_err());
    }

    #[test]
    fn test_build_config_lengths_without_prompting() {
        struct NoPrompt;
        impl PasswordPrompt for NoPrompt {
            fn prompt(&mut self, _label: &str) -> crate::Result<crate::crypto::Password> {
                panic!("paranoid/nogenkey volume creation must not prompt");
            }
        }

        let mut meta: HashMap<String, Vec<u8>> = HashMap::new();
        let paranoid = VolumeOptions::parse("paranoid").unwrap();
        assert_eq!(
            paranoid.build_config(&mut meta, &mut NoPrompt).unwrap().len(),
            16
        );

        let nogenkey = VolumeOptions::parse("nogenkey").unwrap();
        assert_eq!(
            nogenkey.build_config(&mut meta, &mut NoPrompt).unwrap().len(),
            17
        );
        assert!(meta.is_empty());
    }
}
