//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use volcrypt::{Action, Aes256Filter, Error, KEY_SIZE, Mode, Password, PasswordPrompt, Session};

/// Prompt that replays a fixed sequence of entries, then reports an
/// aborted prompt.
pub struct ScriptedPrompt {
    entries: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(entries: &[&str]) -> Self {
        Self {
            entries: entries.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// A prompt that fails immediately; for flows that must not ask.
    pub fn none() -> Self {
        Self::new(&[])
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn prompt(&mut self, _label: &str) -> volcrypt::Result<Password> {
        if self.entries.is_empty() {
            Err(Error::Prompt("scripted input exhausted".into()))
        } else {
            Ok(Password::new(self.entries.remove(0)))
        }
    }
}

/// A nogenkey-mode config blob (salt plus marker byte) with a zero salt.
pub fn nogenkey_config() -> Vec<u8> {
    let mut cfg = vec![0u8; 16];
    cfg.push(0x01);
    cfg
}

/// A normal-mode config blob with a zero salt and an arbitrary
/// fingerprint. The fingerprint is only consulted when prompting, so
/// cache-seeded sessions never look at it.
pub fn normal_config() -> Vec<u8> {
    let mut cfg = vec![0u8; 16];
    cfg.extend_from_slice(&[0xEE; 80]);
    cfg
}

/// Builds a session that adopts a pre-seeded key cache, bypassing both
/// the prompt and the deliberately slow key derivation.
pub fn cached_session(mode: Mode, cfgdir: &Path, key: &[u8; KEY_SIZE]) -> Session {
    std::fs::write(cfgdir.join("key"), key).unwrap();
    let cfg = normal_config();
    let mut meta: HashMap<String, Vec<u8>> = HashMap::new();
    let mut prompt = ScriptedPrompt::none();
    Aes256Filter::data_prepare(mode, "test-object", Some(&cfg), cfgdir, &mut meta, &mut prompt)
        .expect("cache-seeded prepare")
}

/// Drives a list of input chunks through a session, collecting all output.
///
/// Follows the host protocol: each chunk is fed with `Normal` (the final
/// one with `DataEnd`) and re-fed with `Repeat` for as long as the filter
/// asks for it.
pub fn pump_chunks(session: &mut Session, chunks: &[&[u8]], out_cap: usize) -> Vec<u8> {
    let mut produced = Vec::new();
    let mut out = vec![0u8; out_cap];

    for (i, chunk) in chunks.iter().enumerate() {
        let last = i + 1 == chunks.len();
        let mut action = if last { Action::DataEnd } else { Action::Normal };
        loop {
            let (n, next) = session.process(chunk, &mut out, action).expect("process");
            produced.extend_from_slice(&out[..n]);
            match next {
                Action::Repeat => action = Action::Repeat,
                Action::Normal => break,
                Action::DataEnd => return produced,
            }
        }
    }
    produced
}

/// Drives one whole input buffer through a session.
pub fn pump_all(session: &mut Session, input: &[u8], out_cap: usize) -> Vec<u8> {
    pump_chunks(session, &[input], out_cap)
}
