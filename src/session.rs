//! Per-file session establishment and teardown.
//!
//! A session reconciles three possible key sources before any data flows:
//!
//! 1. the volume configuration bytes (salt, and in normal mode the
//!    fingerprint),
//! 2. a locally cached key (`<cfgdir>/key`, 64 raw bytes, mode 0600),
//! 3. interactive password entry, verified against the fingerprint when
//!    one exists.
//!
//! The volume's custom-meta entry `aes256_fp` publishes the fingerprint
//! across clients. A local copy of the last-seen value (`<cfgdir>/custfp`)
//! detects a remote password rotation: when the published value changes,
//! the cached key is discarded before it can silently decrypt freshly
//! rekeyed data. Cache I/O is best-effort throughout; a session without a
//! cache just prompts.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::crypto::{
    BlockCodec, FINGERPRINT_SIZE, KEY_SIZE, MIN_PASSWORD_LEN, Password, SALT_SIZE, SecretBytes,
    fingerprint, kdf,
};
use crate::filter::stream::StreamFilter;
use crate::filter::{Action, Mode};
use crate::host::{MetaStore, PasswordPrompt};
use crate::{Error, Result};

/// Custom-meta key under which the volume fingerprint is published.
pub const META_FINGERPRINT_KEY: &str = "aes256_fp";

/// Key-cache file name inside the volume's config directory.
const KEYFILE_NAME: &str = "key";

/// Last-seen custom-meta fingerprint, cached for change detection.
const CUSTFP_NAME: &str = "custfp";

/// Config length in nogenkey mode: salt plus a one-byte marker.
const NOGENKEY_CONFIG_LEN: usize = SALT_SIZE + 1;

/// Config length in normal mode: salt plus fingerprint.
const NORMAL_CONFIG_LEN: usize = SALT_SIZE + FINGERPRINT_SIZE;

/// An established per-file cipher session.
///
/// Created by [`prepare`][Session::prepare], driven by
/// [`process`][Session::process], destroyed by [`finish`][Session::finish].
/// All key material and staged plaintext are wiped on destruction, also
/// when the session ends after an error.
pub struct Session {
    stream: StreamFilter,
    keyfile_path: Option<PathBuf>,
}

impl Session {
    /// Establishes a session for one file transfer.
    ///
    /// See [`crate::filter::Aes256Filter::data_prepare`] for the argument
    /// contract.
    pub fn prepare(
        mode: Mode,
        filename: &str,
        cfgdata: Option<&[u8]>,
        cfgdir: &Path,
        meta: &mut dyn MetaStore,
        prompt: &mut dyn PasswordPrompt,
    ) -> Result<Session> {
        let cfg = reconcile_config(cfgdata, cfgdir, meta)?;
        let layout = ConfigLayout::classify(&cfg)?;

        let mut keyfile_path = None;
        let mut key = None;
        if !layout.paranoid {
            let path = cfgdir.join(KEYFILE_NAME);
            key = read_key_cache(&path);
            keyfile_path = Some(path);
        }

        let key = match key {
            Some(key) => key,
            None => {
                let key = obtain_key(mode, &layout, meta, prompt)?;
                if let Some(path) = &keyfile_path {
                    write_key_cache(path, &key);
                }
                key
            }
        };

        log::info!("aes256: {:?} session ready for '{}'", mode, filename);
        let codec = BlockCodec::new(key)?;
        Ok(Session {
            stream: StreamFilter::new(mode, codec),
            keyfile_path,
        })
    }

    /// Pumps one round of data through the filter.
    ///
    /// `action` must be the value returned by the previous call for this
    /// input buffer ([`Action::Normal`] for a fresh buffer,
    /// [`Action::DataEnd`] once the input stream is exhausted). Returns
    /// the bytes written into `output` and the action for the next call.
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailed`] / [`Error::DecryptFailed`] on corrupted or
    /// foreign ciphertext; both latch the session terminally.
    pub fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        action: Action,
    ) -> Result<(usize, Action)> {
        self.stream.process(input, output, action)
    }

    /// Tears the session down, wiping key material and buffers.
    ///
    /// Always succeeds, including after processing errors.
    pub fn finish(self) {}

    /// Path of the local key cache, when one applies to this session.
    pub fn keyfile_path(&self) -> Option<&Path> {
        self.keyfile_path.as_deref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stream", &self.stream)
            .field("keyfile_path", &self.keyfile_path)
            .finish()
    }
}

/// Parsed volume configuration.
#[derive(Debug)]
struct ConfigLayout {
    salt: [u8; SALT_SIZE],
    fingerprint: Option<Vec<u8>>,
    paranoid: bool,
}

impl ConfigLayout {
    fn classify(cfg: &[u8]) -> Result<ConfigLayout> {
        let mut salt = [0u8; SALT_SIZE];
        match cfg.len() {
            SALT_SIZE => {
                salt.copy_from_slice(cfg);
                Ok(ConfigLayout {
                    salt,
                    fingerprint: None,
                    paranoid: true,
                })
            }
            NOGENKEY_CONFIG_LEN => {
                salt.copy_from_slice(&cfg[..SALT_SIZE]);
                Ok(ConfigLayout {
                    salt,
                    fingerprint: None,
                    paranoid: false,
                })
            }
            NORMAL_CONFIG_LEN => {
                salt.copy_from_slice(&cfg[..SALT_SIZE]);
                Ok(ConfigLayout {
                    salt,
                    fingerprint: Some(cfg[SALT_SIZE..].to_vec()),
                    paranoid: false,
                })
            }
            n => Err(Error::BadConfig(format!(
                "configuration length {n} (expected 16, 17 or 96)"
            ))),
        }
    }
}

/// Substitutes the published custom-meta fingerprint for absent or
/// nogenkey configuration data, and runs password-change detection.
fn reconcile_config(
    cfgdata: Option<&[u8]>,
    cfgdir: &Path,
    meta: &mut dyn MetaStore,
) -> Result<Vec<u8>> {
    let wants_meta = cfgdata.is_none_or(|d| d.len() == NOGENKEY_CONFIG_LEN);
    if wants_meta {
        if let Some(meta_fp) = meta.get(META_FINGERPRINT_KEY) {
            reconcile_custfp(cfgdir, &meta_fp);
            return Ok(meta_fp);
        }
    }
    cfgdata.map(<[u8]>::to_vec).ok_or_else(|| {
        Error::BadConfig("no configuration data and no published fingerprint".into())
    })
}

/// Compares the published fingerprint against the locally cached copy.
///
/// A fresh copy is written when none exists. A differing copy means the
/// volume password changed remotely: the stale `custfp` and the cached
/// key are unlinked, and the new copy is written on the next prepare.
fn reconcile_custfp(cfgdir: &Path, meta_fp: &[u8]) {
    let custfp = cfgdir.join(CUSTFP_NAME);
    match fs::read(&custfp) {
        Ok(prev) if prev == meta_fp => {}
        Ok(_) => {
            log::info!("aes256: volume password change detected, discarding cached key");
            if let Err(e) = fs::remove_file(&custfp) {
                log::warn!("aes256: cannot remove '{}': {}", custfp.display(), e);
            }
            let keyfile = cfgdir.join(KEYFILE_NAME);
            if let Err(e) = fs::remove_file(&keyfile) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("aes256: cannot remove '{}': {}", keyfile.display(), e);
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Err(e) = write_private(&custfp, meta_fp) {
                log::warn!("aes256: cannot create '{}': {}", custfp.display(), e);
            }
        }
        Err(e) => {
            log::warn!("aes256: cannot read '{}': {}", custfp.display(), e);
        }
    }
}

/// Loads the cached session key, if a well-formed cache exists.
fn read_key_cache(path: &Path) -> Option<SecretBytes> {
    match fs::read(path) {
        Ok(mut bytes) => {
            let key = (bytes.len() == KEY_SIZE).then(|| SecretBytes::from_slice(&bytes));
            bytes.zeroize();
            if key.is_none() {
                log::warn!("aes256: ignoring key cache of unexpected size");
            }
            key
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            log::warn!("aes256: cannot read key cache '{}': {}", path.display(), e);
            None
        }
    }
}

/// Caches the session key, best-effort: any failure unlinks the partial
/// file and the session continues without a cache.
fn write_key_cache(path: &Path, key: &SecretBytes) {
    if let Err(e) = write_private(path, key.as_slice()) {
        log::warn!("aes256: cannot cache volume key at '{}': {}", path.display(), e);
        let _ = fs::remove_file(path);
    }
}

/// Writes a file readable by the owner only.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Derives the session key from an interactive password.
///
/// With a fingerprint available the password is asked once and re-asked
/// on mismatch until it verifies or the user aborts. Without one, uploads
/// confirm the password with a second entry; after derivation the new
/// fingerprint is published to custom-meta (never in paranoid mode).
fn obtain_key(
    mode: Mode,
    layout: &ConfigLayout,
    meta: &mut dyn MetaStore,
    prompt: &mut dyn PasswordPrompt,
) -> Result<SecretBytes> {
    let confirm = layout.fingerprint.is_none() && mode == Mode::Upload;
    let mut mismatched = false;

    loop {
        let password = match ask_password(prompt, confirm) {
            Ok(password) => password,
            // An abort after a failed verification reports the mismatch,
            // not the abort.
            Err(Error::Prompt(_)) if mismatched => return Err(Error::BadPassword),
            Err(e) => return Err(e),
        };

        let key = kdf::derive_key(&password, &layout.salt)?;

        if let Some(fp) = &layout.fingerprint {
            match fingerprint::verify(&key, fp) {
                Ok(()) => return Ok(key),
                Err(Error::BadPassword) => {
                    log::warn!("aes256: invalid password");
                    mismatched = true;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        if !layout.paranoid {
            let fp = fingerprint::create(&key)?;
            let mut entry = Vec::with_capacity(NORMAL_CONFIG_LEN);
            entry.extend_from_slice(&layout.salt);
            entry.extend_from_slice(&fp);
            meta.set(META_FINGERPRINT_KEY, &entry);
        }
        return Ok(key);
    }
}

/// One password entry, re-asked until it meets the minimum length (and,
/// when `confirm` is set, until both entries match).
fn ask_password(prompt: &mut dyn PasswordPrompt, confirm: bool) -> Result<Password> {
    loop {
        let password = prompt.prompt("aes256: enter encryption password: ")?;
        if !password.is_acceptable() {
            log::warn!(
                "aes256: password must be at least {} characters",
                MIN_PASSWORD_LEN
            );
            continue;
        }
        if confirm {
            let again = prompt.prompt("aes256: re-enter encryption password: ")?;
            if !password.ct_eq(&again) {
                log::warn!("aes256: passwords do not match");
                continue;
            }
        }
        return Ok(password);
    }
}
